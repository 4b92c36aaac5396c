//! Suspendable computations and the async adapter that builds them.
//!
//! A [`Computation`] is a resumable state machine: the driver pushes a
//! [`Resume`] in, the computation runs until it either completes or suspends
//! on a [`Yielded`] item. [`computation`] builds one from an async body, so
//! business logic reads as straight-line code while staying pure: the body
//! can only suspend through its [`Effects`] handle.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context as TaskContext, Poll};

use serde_json::Value;
use tracing::trace;

use crate::effect::Effect;
use crate::error::{Error, Result};

/// Input pushed into a computation at its suspension point.
#[derive(Debug)]
pub enum Resume {
    /// Begin a freshly created computation.
    Start,
    /// The outstanding yield resolved to this value.
    Value(Value),
    /// The outstanding yield failed. The computation sees the error at its
    /// suspension point and may catch it or let it propagate.
    Failed(Error),
}

/// What a resume call produced.
pub enum Step {
    /// The computation suspended on an item for the driver.
    Yielded(Yielded),
    /// The computation finished with its final value.
    Complete(Value),
}

/// An item yielded at a suspension point.
pub enum Yielded {
    /// An effect descriptor for the resolver.
    Effect(Effect),
    /// A nested computation the driver runs in place; its final value
    /// becomes the outcome of this yield.
    Computation(Box<dyn Computation>),
}

impl From<Effect> for Yielded {
    fn from(effect: Effect) -> Self {
        Yielded::Effect(effect)
    }
}

impl fmt::Debug for Yielded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Yielded::Effect(effect) => f.debug_tuple("Effect").field(effect).finish(),
            Yielded::Computation(_) => f.write_str("Computation(..)"),
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Yielded(yielded) => f.debug_tuple("Yielded").field(yielded).finish(),
            Step::Complete(value) => f.debug_tuple("Complete").field(value).finish(),
        }
    }
}

/// A resumable unit of business logic.
///
/// `resume` must be called with [`Resume::Start`] exactly once, then with
/// [`Resume::Value`] or [`Resume::Failed`] for each yield, in order. An
/// `Ok` return after `Failed` means the computation caught the error; an
/// `Err` return re-raises it.
pub trait Computation: Send {
    fn resume(&mut self, input: Resume) -> Result<Step>;
}

impl<C: Computation + ?Sized> Computation for Box<C> {
    fn resume(&mut self, input: Resume) -> Result<Step> {
        (**self).resume(input)
    }
}

/// Where the adapter and its in-flight [`Perform`] trade state.
#[derive(Default)]
struct Slot {
    pending: Option<Yielded>,
    outcome: Option<Result<Value>>,
    conflict: bool,
}

type SharedSlot = Arc<Mutex<Slot>>;

/// Handle for suspending inside a [`computation`] body.
#[derive(Clone)]
pub struct Effects {
    slot: SharedSlot,
}

impl Effects {
    /// Suspend on an effect descriptor. Resolves to the driver's outcome
    /// for it, or to the failure the driver threw back in.
    pub fn perform(&self, effect: Effect) -> Perform {
        Perform {
            slot: self.slot.clone(),
            item: Some(Yielded::Effect(effect)),
        }
    }

    /// Suspend on a nested computation. Resolves to its final value.
    pub fn nest(&self, computation: impl Computation + 'static) -> Perform {
        Perform {
            slot: self.slot.clone(),
            item: Some(Yielded::Computation(Box::new(computation))),
        }
    }
}

/// Future returned by [`Effects::perform`] and [`Effects::nest`].
///
/// Pending from the moment it registers its item until the driver resumes
/// the computation with the item's outcome.
pub struct Perform {
    slot: SharedSlot,
    item: Option<Yielded>,
}

impl Future for Perform {
    type Output = Result<Value>;

    fn poll(self: Pin<&mut Self>, _cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut slot = this.slot.lock().unwrap();
        if let Some(item) = this.item.take() {
            // First poll registers the yield. A second registration before
            // the first resolves means the body awaited two performs at once.
            if slot.pending.is_some() {
                slot.conflict = true;
                return Poll::Pending;
            }
            slot.pending = Some(item);
            return Poll::Pending;
        }
        match slot.outcome.take() {
            Some(result) => Poll::Ready(result),
            None => Poll::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Suspended,
    Finished,
}

/// A [`Computation`] built from an async body by [`computation`].
pub struct AsyncComputation {
    future: Pin<Box<dyn Future<Output = Result<Value>> + Send>>,
    slot: SharedSlot,
    phase: Phase,
}

/// Build a computation from an async body.
///
/// The body receives an [`Effects`] handle whose `perform` and `nest`
/// futures are its only legal suspension points. Awaiting anything else,
/// or awaiting two performs concurrently, surfaces as
/// [`Error::InvalidResume`]; concurrency belongs in a parallel descriptor.
pub fn computation<F, Fut>(body: F) -> AsyncComputation
where
    F: FnOnce(Effects) -> Fut,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    let slot = SharedSlot::default();
    let effects = Effects { slot: slot.clone() };
    AsyncComputation {
        future: Box::pin(body(effects)),
        slot,
        phase: Phase::Created,
    }
}

impl Computation for AsyncComputation {
    fn resume(&mut self, input: Resume) -> Result<Step> {
        trace!(phase = ?self.phase, input = ?input, "resuming computation");
        match (self.phase, &input) {
            (Phase::Finished, _) => {
                return Err(Error::invalid_resume("computation already completed"))
            }
            (Phase::Created, Resume::Start) => {}
            (Phase::Created, _) => {
                return Err(Error::invalid_resume("computation was never started"))
            }
            (Phase::Suspended, Resume::Start) => {
                return Err(Error::invalid_resume("computation already started"))
            }
            (Phase::Suspended, _) => {}
        }

        match input {
            Resume::Start => {}
            Resume::Value(value) => self.slot.lock().unwrap().outcome = Some(Ok(value)),
            Resume::Failed(error) => self.slot.lock().unwrap().outcome = Some(Err(error)),
        }

        // The body only suspends through Perform, which needs no wakeups:
        // progress comes from the next resume call, not from a reactor.
        let waker = futures::task::noop_waker_ref();
        let mut cx = TaskContext::from_waker(waker);
        match self.future.as_mut().poll(&mut cx) {
            Poll::Ready(Ok(value)) => {
                self.phase = Phase::Finished;
                Ok(Step::Complete(value))
            }
            Poll::Ready(Err(error)) => {
                self.phase = Phase::Finished;
                Err(error)
            }
            Poll::Pending => {
                let mut slot = self.slot.lock().unwrap();
                if slot.conflict {
                    self.phase = Phase::Finished;
                    return Err(Error::invalid_resume(
                        "two effects performed concurrently; describe them as a parallel group",
                    ));
                }
                match slot.pending.take() {
                    Some(yielded) => {
                        self.phase = Phase::Suspended;
                        Ok(Step::Yielded(yielded))
                    }
                    None => {
                        self.phase = Phase::Finished;
                        Err(Error::invalid_resume(
                            "computation suspended on a future outside the effect protocol",
                        ))
                    }
                }
            }
        }
    }
}
