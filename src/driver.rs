//! The effect driver: runs a computation to completion against a context.

use serde_json::Value;
use tracing::{debug, trace};

use crate::computation::{Computation, Resume, Step, Yielded};
use crate::context::Context;
use crate::error::Result;
use crate::resolver::resolve;

/// Drive `computation` until it completes or fails.
///
/// Each yielded descriptor is resolved against `context` and the outcome fed
/// back in at the suspension point; a yielded nested computation is driven
/// recursively and its final value substituted the same way. Resolution
/// failures are thrown into the computation first, so business logic gets a
/// chance to catch them; uncaught, they become `run`'s terminal result.
///
/// Yields are resolved strictly in order. The only concurrency is inside a
/// parallel descriptor, handled by the resolver.
pub async fn run(context: &Context, computation: impl Computation) -> Result<Value> {
    let mut computation = computation;
    let mut input = Resume::Start;
    loop {
        match computation.resume(input)? {
            Step::Complete(value) => {
                debug!(%value, "computation complete");
                return Ok(value);
            }
            Step::Yielded(Yielded::Effect(effect)) => {
                trace!(%effect, "yielded effect");
                input = match resolve(context, &effect).await {
                    Ok(value) => Resume::Value(value),
                    Err(error) => Resume::Failed(error),
                };
            }
            Step::Yielded(Yielded::Computation(inner)) => {
                trace!("yielded nested computation");
                input = match Box::pin(run(context, inner)).await {
                    Ok(value) => Resume::Value(value),
                    Err(error) => Resume::Failed(error),
                };
            }
        }
    }
}
