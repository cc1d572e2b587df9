use std::env::VarError;

use once_cell::sync::Lazy;

use crate::error::Error;

type Result<T> = std::result::Result<T, Error>;

/// Maximum nesting depth used when none is configured.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 16;

/// Environment variable that overrides the maximum nesting depth for
/// [`crate::TrampolineScheduler::from_env`].
pub const MAX_NESTING_DEPTH_ENV: &str = "TRAMPOLINE_MAX_NESTING_DEPTH";

/// Maximum nesting depth read from the environment. Read once per process.
static CONFIGURED_MAX_NESTING_DEPTH: Lazy<Result<usize>> =
    Lazy::new(|| max_nesting_depth_from_var(std::env::var(MAX_NESTING_DEPTH_ENV)));

/// Get the maximum nesting depth configured through [`MAX_NESTING_DEPTH_ENV`], or
/// [`DEFAULT_MAX_NESTING_DEPTH`] if the variable is not set.
pub fn configured_max_nesting_depth() -> Result<usize> {
    (*CONFIGURED_MAX_NESTING_DEPTH).clone()
}

/// Parse a maximum nesting depth. Surrounding whitespace is ignored; the value must be a positive
/// integer.
///
/// # Example
///
/// ```
/// # use trampoline_scheduler::config::parse_max_nesting_depth;
/// assert_eq!(parse_max_nesting_depth(" 32 "), Ok(32));
/// assert!(parse_max_nesting_depth("0").is_err());
/// ```
pub fn parse_max_nesting_depth(value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(depth) if depth > 0 => Ok(depth),
        _ => Err(Error::InvalidMaxNestingDepth(value.to_string())),
    }
}

fn max_nesting_depth_from_var(var: std::result::Result<String, VarError>) -> Result<usize> {
    match var {
        Ok(value) => parse_max_nesting_depth(&value),
        Err(VarError::NotPresent) => Ok(DEFAULT_MAX_NESTING_DEPTH),
        Err(VarError::NotUnicode(_)) => Err(Error::Config(format!(
            "{MAX_NESTING_DEPTH_ENV} is not valid unicode"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(parse_max_nesting_depth("1"), Ok(1));
        assert_eq!(parse_max_nesting_depth("\t1024\n"), Ok(1024));
    }

    #[test]
    fn test_parse_rejects_invalid() {
        for value in ["", "0", "-3", "sixteen", "1.5"] {
            assert_eq!(
                parse_max_nesting_depth(value),
                Err(Error::InvalidMaxNestingDepth(value.to_string())),
            );
        }
    }

    #[test]
    fn test_unset_var_uses_default() {
        assert_eq!(
            max_nesting_depth_from_var(Err(VarError::NotPresent)),
            Ok(DEFAULT_MAX_NESTING_DEPTH),
        );
    }

    #[test]
    fn test_set_var_is_parsed() {
        assert_eq!(max_nesting_depth_from_var(Ok("8".to_string())), Ok(8));
        assert!(max_nesting_depth_from_var(Ok("zero".to_string())).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_unicode_var() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let value = OsString::from_vec(vec![0xff, 0xfe]);
        assert!(matches!(
            max_nesting_depth_from_var(Err(VarError::NotUnicode(value))),
            Err(Error::Config(_)),
        ));
    }
}
