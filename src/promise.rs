//! Single-settlement result handles.
//!
//! A `Deferred` is the write side and a `Promise` the read side of the same
//! state cell. The state moves from pending to resolved or rejected exactly
//! once; later attempts return `WorkerError::AlreadySettled` and leave the first
//! value untouched. Settlement is driven by the single-threaded command loop,
//! so there is no locking, only `RefCell` borrows that are always released
//! before user code (continuations, wakers) runs.
use crate::codec::EncodedValues;
use crate::error::{Failure, WorkerError};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

pub type Settlement = Result<EncodedValues, Failure>;

type Continuation = Box<dyn FnOnce(Settlement)>;

enum State {
    Pending {
        continuation: Option<Continuation>,
        waker: Option<Waker>,
    },
    Settled(Settlement),
}

impl State {
    fn pending() -> Self {
        State::Pending {
            continuation: None,
            waker: None,
        }
    }
}

/// Write side: settles the shared state once.
#[derive(Clone)]
pub struct Deferred {
    state: Rc<RefCell<State>>,
}

/// Read side: observe the settlement via `then` or by awaiting it.
#[derive(Clone)]
pub struct Promise {
    state: Rc<RefCell<State>>,
}

impl Deferred {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State::pending())),
        }
    }

    pub fn promise(&self) -> Promise {
        Promise {
            state: self.state.clone(),
        }
    }

    pub fn resolve(&self, values: EncodedValues) -> Result<(), WorkerError> {
        self.settle(Ok(values))
    }

    pub fn reject(&self, failure: Failure) -> Result<(), WorkerError> {
        self.settle(Err(failure))
    }

    pub fn is_settled(&self) -> bool {
        matches!(*self.state.borrow(), State::Settled(_))
    }

    fn settle(&self, settlement: Settlement) -> Result<(), WorkerError> {
        let (continuation, waker) = {
            let mut state = self.state.borrow_mut();
            match std::mem::replace(&mut *state, State::Settled(settlement.clone())) {
                State::Settled(first) => {
                    *state = State::Settled(first);
                    return Err(WorkerError::AlreadySettled);
                }
                State::Pending { continuation, waker } => (continuation, waker),
            }
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        if let Some(continuation) = continuation {
            continuation(settlement);
        }
        Ok(())
    }
}

impl Default for Deferred {
    fn default() -> Self {
        Self::new()
    }
}

impl Promise {
    pub fn is_settled(&self) -> bool {
        matches!(*self.state.borrow(), State::Settled(_))
    }

    pub fn is_pending(&self) -> bool {
        !self.is_settled()
    }

    /// Snapshot of the settlement, if any.
    pub fn result(&self) -> Option<Settlement> {
        match &*self.state.borrow() {
            State::Settled(s) => Some(s.clone()),
            State::Pending { .. } => None,
        }
    }

    /// Register the single continuation. Runs immediately if already settled.
    pub fn then<F>(&self, f: F) -> Result<(), WorkerError>
    where
        F: FnOnce(Settlement) + 'static,
    {
        let ready = {
            let mut state = self.state.borrow_mut();
            match &mut *state {
                State::Pending { continuation, .. } => {
                    if continuation.is_some() {
                        return Err(WorkerError::ContinuationRegistered);
                    }
                    *continuation = Some(Box::new(f));
                    return Ok(());
                }
                State::Settled(s) => s.clone(),
            }
        };
        f(ready);
        Ok(())
    }
}

impl Future for Promise {
    type Output = Settlement;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.state.borrow_mut();
        match &mut *state {
            State::Settled(s) => Poll::Ready(s.clone()),
            State::Pending { waker, .. } => {
                *waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Pending { continuation, .. } => f
                .debug_struct("Pending")
                .field("has_continuation", &continuation.is_some())
                .finish(),
            State::Settled(s) => f.debug_tuple("Settled").field(s).finish(),
        }
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Deferred").field(&*self.state.borrow()).finish()
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Promise").field(&*self.state.borrow()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::task::{RawWaker, RawWakerVTable};

    fn noop_waker() -> Waker {
        unsafe fn clone(_: *const ()) -> RawWaker {
            RawWaker::new(std::ptr::null(), &VTABLE)
        }
        unsafe fn wake(_: *const ()) {}
        unsafe fn wake_by_ref(_: *const ()) {}
        unsafe fn drop(_: *const ()) {}
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, wake, wake_by_ref, drop);
        unsafe { Waker::from_raw(RawWaker::new(std::ptr::null(), &VTABLE)) }
    }

    fn poll_once(p: &mut Promise) -> Poll<Settlement> {
        let w = noop_waker();
        let mut cx = Context::from_waker(&w);
        Pin::new(p).poll(&mut cx)
    }

    #[test]
    fn test_settles_once() {
        let d = Deferred::new();
        let p = d.promise();
        assert!(p.is_pending());

        d.resolve(EncodedValues::null()).unwrap();
        assert_eq!(d.reject(Failure::canceled("late")), Err(WorkerError::AlreadySettled));
        assert_eq!(d.resolve(EncodedValues::empty()), Err(WorkerError::AlreadySettled));
        assert_eq!(p.result(), Some(Ok(EncodedValues::null())));
    }

    #[test]
    fn test_continuation_runs_on_settle() {
        let d = Deferred::new();
        let seen = Rc::new(Cell::new(0));
        let s = seen.clone();
        d.promise()
            .then(move |r| {
                assert!(r.is_err());
                s.set(s.get() + 1);
            })
            .unwrap();
        assert_eq!(seen.get(), 0);
        d.reject(Failure::canceled("x")).unwrap();
        assert_eq!(seen.get(), 1);
        let _ = d.reject(Failure::canceled("again"));
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_continuation_after_settle_runs_immediately() {
        let d = Deferred::new();
        d.resolve(EncodedValues::empty()).unwrap();
        let seen = Rc::new(Cell::new(false));
        let s = seen.clone();
        d.promise().then(move |r| s.set(r.is_ok())).unwrap();
        assert!(seen.get());
    }

    #[test]
    fn test_single_continuation() {
        let d = Deferred::new();
        let p = d.promise();
        p.then(|_| {}).unwrap();
        assert_eq!(p.then(|_| {}), Err(WorkerError::ContinuationRegistered));
    }

    #[test]
    fn test_continuation_may_inspect_its_own_deferred() {
        let d = Deferred::new();
        let inner = d.clone();
        let observed = Rc::new(Cell::new(false));
        let o = observed.clone();
        d.promise()
            .then(move |_| {
                // No borrow is held while the continuation runs.
                o.set(inner.is_settled());
                assert_eq!(inner.resolve(EncodedValues::empty()), Err(WorkerError::AlreadySettled));
            })
            .unwrap();
        d.resolve(EncodedValues::null()).unwrap();
        assert!(observed.get());
    }

    #[test]
    fn test_poll_as_future() {
        let d = Deferred::new();
        let mut p = d.promise();
        assert!(poll_once(&mut p).is_pending());
        d.reject(Failure::application("boom")).unwrap();
        match poll_once(&mut p) {
            Poll::Ready(Err(f)) => assert_eq!(f.message, "boom"),
            other => panic!("unexpected poll result {other:?}"),
        }
    }
}
