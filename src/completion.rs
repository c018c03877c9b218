//! Suspension primitive: submit one operation, resume with its result
//!
//! Every operation gets its own [`CompletionSlot`], shared between the
//! engine (producer) and the [`Completion`] future (consumer). The engine
//! fills the slot exactly once, handing back the finished [`Op`] with its
//! result; only the future that submitted the operation is woken.

use crate::engine::Engine;
use crate::op::Op;
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// Shared state between the engine and the future
#[derive(Default)]
struct SlotState {
    /// The raw result and the finished op (set by the engine)
    result: Option<(i32, Op)>,
    /// The waker to notify when complete (set by future poll)
    waker: Option<Waker>,
    /// The engine has delivered a result
    completed: bool,
}

/// Single-producer / single-consumer result slot for one operation.
#[derive(Default)]
pub struct CompletionSlot {
    state: RefCell<SlotState>,
}

impl CompletionSlot {
    /// Create an empty slot
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Deliver the raw result with the finished `op` and wake the submitter.
    ///
    /// An engine calls this only once the kernel no longer references any
    /// memory owned by `op`.
    ///
    /// # Panics
    ///
    /// If a result was already delivered to this slot.
    pub fn complete(&self, res: i32, op: Op) {
        let waker = {
            let mut state = self.state.borrow_mut();
            assert!(!state.completed, "completion delivered twice");
            state.completed = true;
            state.result = Some((res, op));
            state.waker.take()
        };
        // Wake outside the borrow; the executor may poll re-entrantly.
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Whether the engine has delivered a result
    pub fn is_complete(&self) -> bool {
        self.state.borrow().completed
    }

    fn poll_result(&self, cx: &mut Context<'_>) -> Poll<(i32, Op)> {
        let mut state = self.state.borrow_mut();
        if let Some(done) = state.result.take() {
            return Poll::Ready(done);
        }
        state.waker = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl fmt::Debug for CompletionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("CompletionSlot")
            .field("completed", &state.completed)
            .field("result", &state.result.as_ref().map(|(res, _)| *res))
            .finish_non_exhaustive()
    }
}

/// A Future that resolves to the raw signed result of one operation,
/// together with the finished [`Op`] and the data it owns.
///
/// The operation is submitted when the future is created, so every field
/// of the descriptor is in place before the caller suspends.
///
/// # Dropping
///
/// Dropping an unfinished `Completion` blocks until the engine reports the
/// completion, so the operation's effects are in place before the caller
/// moves on. Leaking it instead is harmless: the engine owns the `Op` and
/// its buffers until the kernel is done with them.
pub struct Completion<'e, E: Engine + ?Sized> {
    engine: &'e E,
    slot: Rc<CompletionSlot>,
    done: bool,
}

impl<'e, E: Engine + ?Sized> Completion<'e, E> {
    /// Submit `op` and return the future for its result
    pub fn new(engine: &'e E, op: Op) -> Self {
        let slot = engine.submit(op);
        Self {
            engine,
            slot,
            done: false,
        }
    }
}

impl<E: Engine + ?Sized> Future for Completion<'_, E> {
    type Output = (i32, Op);

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<(i32, Op)> {
        let res = self.slot.poll_result(cx);
        if res.is_ready() {
            self.done = true;
        }
        res
    }
}

impl<E: Engine + ?Sized> Drop for Completion<'_, E> {
    fn drop(&mut self) {
        if !self.done && !self.slot.is_complete() {
            self.engine.wait_for(&self.slot);
        }
    }
}

impl<E: Engine + ?Sized> fmt::Debug for Completion<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("slot", &self.slot)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

/// Issue `op` on `engine` and suspend until its completion arrives.
///
/// Returns the raw result: a negated errno, or a byte count / descriptor.
pub async fn issue<E: Engine + ?Sized>(engine: &E, op: Op) -> i32 {
    Completion::new(engine, op).await.0
}
