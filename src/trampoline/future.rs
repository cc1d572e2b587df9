use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use crate::receiver::{self, Completion};
use crate::stop_token::StopToken;
use crate::trampoline::scheduler::ScheduleSender;

/// Future that schedules on the trampoline and resolves to the terminal signal of the operation.
///
/// The operation is started the first time the future is polled. When the poll happens outside of
/// a trampoline, or inside one that has room left, the operation completes inline and the first poll
/// is already ready. When the trampoline on the polling thread is nested to the limit, the operation
/// is deferred; the future then returns pending and is woken by the drain loop.
///
/// # Usage
///
/// ```
/// # use trampoline_scheduler::{Completion, TrampolineScheduler};
/// # tokio_test::block_on(async {
/// let completion = TrampolineScheduler::default().schedule().await;
/// assert_eq!(completion, Completion::Value);
/// # })
/// ```
pub struct ScheduleFuture<T> {
    sender: ScheduleSender,
    state: State<T>,
}

enum State<T> {
    /// Future has been created but not yet been polled. Holds the stop token for the receiver.
    Initialized(T),
    /// Operation has been started but not yet completed.
    Running(Arc<Mutex<Shared>>),
    /// Future has returned its completion.
    Done,
}

/// State shared between the future and the receiver of its operation.
#[derive(Default)]
struct Shared {
    completion: Option<Completion>,
    waker: Option<Waker>,
}

impl Shared {
    fn complete(shared: &Mutex<Shared>, completion: Completion) {
        let waker = {
            let mut shared = shared.lock().unwrap();
            shared.completion = Some(completion);
            shared.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T> ScheduleFuture<T>
where
    T: StopToken + Clone + Unpin + 'static,
{
    pub(super) fn new(sender: ScheduleSender, token: T) -> Self {
        ScheduleFuture {
            sender,
            state: State::Initialized(token),
        }
    }

    fn poll_shared(&mut self, shared: Arc<Mutex<Shared>>, cx: &mut Context) -> Poll<Completion> {
        let completion = {
            let mut guard = shared.lock().unwrap();
            let completion = guard.completion.take();
            if completion.is_none() {
                guard.waker = Some(cx.waker().clone());
            }
            completion
        };
        match completion {
            Some(completion) => {
                self.state = State::Done;
                Poll::Ready(completion)
            }
            None => {
                self.state = State::Running(shared);
                Poll::Pending
            }
        }
    }
}

impl<T> std::future::Future for ScheduleFuture<T>
where
    T: StopToken + Clone + Unpin + 'static,
{
    type Output = Completion;

    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        let this = self.get_mut();
        match std::mem::replace(&mut this.state, State::Done) {
            State::Initialized(token) => {
                let shared = Arc::new(Mutex::new(Shared::default()));
                this.sender
                    .start_detached(receiver::from_fn_with_stop_token(token, {
                        let shared = shared.clone();
                        move |completion| Shared::complete(&shared, completion)
                    }));
                this.poll_shared(shared, cx)
            }
            State::Running(shared) => this.poll_shared(shared, cx),
            // It is illegal to poll a future after it has become ready before.
            State::Done => panic!("future polled after completion"),
        }
    }
}

impl<T> std::fmt::Debug for ScheduleFuture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let state = match self.state {
            State::Initialized(_) => "initialized",
            State::Running(_) => "running",
            State::Done => "done",
        };
        f.debug_struct("ScheduleFuture")
            .field("sender", &self.sender)
            .field("state", &state)
            .finish()
    }
}
