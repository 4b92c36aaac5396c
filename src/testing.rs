//! Test harness: drives a computation against a queue of canned
//! expectations instead of a real context.
//!
//! Each yielded descriptor is matched against the next unconsumed
//! expectation by structural equality and answered with its registered
//! value or stub. Nothing is resolved, nothing is awaited; the whole drive
//! is synchronous, so protocol violations fail the test at the exact yield
//! that went wrong.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::computation::{Computation, Resume, Step, Yielded};
use crate::effect::Effect;
use crate::error::{Error, Result};

/// Stub invoked with a yielded descriptor's trailing elements.
pub type StubFn = Arc<dyn Fn(Vec<Value>) -> Value + Send + Sync>;

/// What to feed back for an expected descriptor.
pub enum YieldSpec {
    /// A literal value.
    Value(Value),
    /// A stub called with the descriptor's call arguments. Read stubs
    /// compute a value; write stubs record a mutation and return whatever
    /// the computation should see.
    Stub(StubFn),
}

impl fmt::Debug for YieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YieldSpec::Value(value) => f.debug_tuple("Value").field(value).finish(),
            YieldSpec::Stub(_) => f.write_str("Stub(..)"),
        }
    }
}

/// One entry in the expectation queue: the descriptor the computation must
/// yield next, and what to answer it with.
#[derive(Debug)]
pub struct Expectation {
    effect: Effect,
    yields: YieldSpec,
}

impl Expectation {
    /// Expect `effect` and answer it with a literal value.
    pub fn returns(effect: Effect, value: impl Into<Value>) -> Self {
        Expectation {
            effect,
            yields: YieldSpec::Value(value.into()),
        }
    }

    /// Expect `effect` and answer it by calling `stub` with the
    /// descriptor's call arguments.
    pub fn calls<F>(effect: Effect, stub: F) -> Self
    where
        F: Fn(Vec<Value>) -> Value + Send + Sync + 'static,
    {
        Expectation {
            effect,
            yields: YieldSpec::Stub(Arc::new(stub)),
        }
    }
}

/// Substitute driver that answers yields from an ordered expectation queue.
///
/// Strict by default: leftover expectations at completion fail the run.
/// [`allow_unused`](TestHarness::allow_unused) relaxes that check.
#[derive(Debug)]
pub struct TestHarness {
    queue: VecDeque<Expectation>,
    allow_unused: bool,
}

impl TestHarness {
    pub fn new(expectations: impl IntoIterator<Item = Expectation>) -> Self {
        TestHarness {
            queue: expectations.into_iter().collect(),
            allow_unused: false,
        }
    }

    /// Let the computation complete while expectations remain queued.
    pub fn allow_unused(mut self) -> Self {
        self.allow_unused = true;
        self
    }

    /// Drive `computation` to completion against the queue.
    ///
    /// Matching is deep structural equality on the whole descriptor: mode,
    /// path, and every call argument (for a parallel group, every nested
    /// descriptor). Protocol violations abort immediately; they are never
    /// thrown into the computation.
    pub fn run(mut self, computation: impl Computation) -> Result<Value> {
        let value = self.drive(computation)?;
        if !self.allow_unused && !self.queue.is_empty() {
            return Err(Error::UnusedExpectations {
                remaining: self.queue.len(),
            });
        }
        Ok(value)
    }

    fn drive(&mut self, computation: impl Computation) -> Result<Value> {
        let mut computation = computation;
        let mut input = Resume::Start;
        loop {
            match computation.resume(input)? {
                Step::Complete(value) => return Ok(value),
                Step::Yielded(Yielded::Effect(effect)) => {
                    trace!(%effect, "yielded effect");
                    input = Resume::Value(self.answer(&effect)?);
                }
                Step::Yielded(Yielded::Computation(inner)) => {
                    trace!("yielded nested computation");
                    // Nested computations share the outer queue; their
                    // business failures are catchable at the outer yield,
                    // protocol violations are not.
                    input = match self.drive(inner) {
                        Ok(value) => Resume::Value(value),
                        Err(error) if error.is_protocol_violation() => return Err(error),
                        Err(error) => Resume::Failed(error),
                    };
                }
            }
        }
    }

    fn answer(&mut self, effect: &Effect) -> Result<Value> {
        let Some(expected) = self.queue.pop_front() else {
            return Err(Error::UnexpectedEffect {
                reason: format!("no expectations remain, but the computation yielded {effect}"),
            });
        };
        if &expected.effect != effect {
            return Err(Error::UnexpectedEffect {
                reason: format!("expected {}, got {}", expected.effect, effect),
            });
        }
        debug!(%effect, "matched expectation");
        Ok(match expected.yields {
            YieldSpec::Value(value) => value,
            YieldSpec::Stub(stub) => stub(trailing_elements(effect)),
        })
    }
}

/// The descriptor elements handed to a stub: call arguments for calls, the
/// nested descriptors in wire form for a parallel group.
fn trailing_elements(effect: &Effect) -> Vec<Value> {
    match effect.nested() {
        Some(group) => group.iter().map(Effect::to_value).collect(),
        None => effect.args().to_vec(),
    }
}

/// Drive `computation` against `expectations`, strictly: every yield must
/// match the next expectation in order, and every expectation must be
/// consumed by the time the computation completes.
pub fn test_run(
    expectations: impl IntoIterator<Item = Expectation>,
    computation: impl Computation,
) -> Result<Value> {
    TestHarness::new(expectations).run(computation)
}
