//! # Offstage
//!
//! An effect interpreter: business logic is written as pure, suspendable
//! computations that yield descriptions of side effects, and a driver
//! performs the effects and feeds results back in.
//!
//! ```
//! use offstage::{computation, run, Context, Effect};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> offstage::Result<()> {
//! let context = Context::new().with_value("value", json!("foo"));
//! let comp = computation(|fx| async move {
//!     fx.perform(Effect::read("value")).await
//! });
//! assert_eq!(run(&context, comp).await?, json!("foo"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - `effect` - Effect descriptors and their `[mode?, path, ...args]` wire shape
//! - `context` - The nested map of data and callables descriptors resolve against
//! - `computation` - The suspend/resume protocol and the async computation adapter
//! - `resolver` - Resolves one descriptor to its outcome
//! - `driver` - `run`: drives a computation to completion against a context
//! - `testing` - `test_run`: drives a computation against canned expectations
//! - `error` - Crate error type

pub mod computation;
pub mod context;
pub mod driver;
pub mod effect;
pub mod error;
pub mod resolver;
pub mod testing;

pub use computation::{computation, Computation, Effects, Resume, Step, Yielded};
pub use context::{Completer, Context, ContextEntry};
pub use driver::run;
pub use effect::{Effect, Mode, Path};
pub use error::{Error, Result};
pub use resolver::resolve;
pub use testing::{test_run, Expectation, TestHarness, YieldSpec};
