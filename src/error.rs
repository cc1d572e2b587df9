/// An error that occurred while configuring a trampoline scheduler.
///
/// Note that scheduling itself never fails. Operations either run inline or are deferred, and the
/// only observable outcomes are the two terminal signals delivered to the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The configured maximum nesting depth is not a positive integer.
    InvalidMaxNestingDepth(String),
    /// The configuration could not be read from the environment.
    Config(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::InvalidMaxNestingDepth(value) => write!(
                f,
                "invalid maximum nesting depth: {value:?} (expected a positive integer)",
            ),
            Error::Config(message) => write!(f, "failed to read configuration: {message}"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            Error::InvalidMaxNestingDepth("abc".to_string()).to_string(),
            "invalid maximum nesting depth: \"abc\" (expected a positive integer)",
        );
        assert_eq!(
            Error::Config("not unicode".to_string()).to_string(),
            "failed to read configuration: not unicode",
        );
    }
}
