//! Resolves effect descriptors against a context.

use anyhow::anyhow;
use futures::future::try_join_all;
use serde_json::Value;
use tracing::{debug, trace};

use crate::context::{Completer, Context, ContextEntry};
use crate::effect::{Effect, Path};
use crate::error::{Error, Result};

/// Where a path walk landed.
enum Found<'a> {
    /// A context entry, possibly callable.
    Entry(&'a ContextEntry),
    /// Plain data inside a `Value::Object` interior.
    Data(&'a Value),
}

/// Resolve one descriptor to its outcome.
///
/// Parallel groups resolve their members concurrently and reassemble the
/// outcomes in input order; the first failure wins. Every other descriptor
/// walks its path and then either invokes the callable it found or yields
/// the plain value as-is.
pub async fn resolve(context: &Context, effect: &Effect) -> Result<Value> {
    match effect {
        Effect::Parallel(group) => resolve_parallel(context, group).await,
        Effect::Call { path, args } => {
            trace!(%path, "resolving direct effect");
            let found = lookup(context, path)?;
            invoke_direct(found, path, args).await
        }
        Effect::CallbackCall { path, args } => {
            trace!(%path, "resolving callback effect");
            let found = lookup(context, path)?;
            invoke_callback(found, path, args).await
        }
    }
}

async fn resolve_parallel(context: &Context, group: &[Effect]) -> Result<Value> {
    debug!(effects = group.len(), "resolving parallel group");
    let outcomes = try_join_all(
        group
            .iter()
            .map(|nested| Box::pin(resolve(context, nested))),
    )
    .await?;
    Ok(Value::Array(outcomes))
}

/// Walk `path` through the context. Intermediate segments traverse entry
/// maps and object-shaped data; anything else stops the walk.
fn lookup<'a>(context: &'a Context, path: &Path) -> Result<Found<'a>> {
    if path.is_empty() {
        return Err(Error::malformed("descriptor path has no segments"));
    }

    enum Cursor<'a> {
        Entries(&'a Context),
        Data(&'a Value),
    }

    let segments = path.segments();
    let mut cursor = Cursor::Entries(context);
    for (index, segment) in segments.iter().enumerate() {
        let last = index + 1 == segments.len();
        match cursor {
            Cursor::Entries(entries) => {
                let entry = entries
                    .get(segment)
                    .ok_or_else(|| Error::path_not_found(path, segment))?;
                if last {
                    return Ok(Found::Entry(entry));
                }
                cursor = match entry {
                    ContextEntry::Map(inner) => Cursor::Entries(inner),
                    ContextEntry::Value(value) => Cursor::Data(value),
                    _ => return Err(Error::path_not_found(path, &segments[index + 1])),
                };
            }
            Cursor::Data(value) => {
                let Value::Object(map) = value else {
                    return Err(Error::path_not_found(path, segment));
                };
                let next = map
                    .get(segment)
                    .ok_or_else(|| Error::path_not_found(path, segment))?;
                if last {
                    return Ok(Found::Data(next));
                }
                cursor = Cursor::Data(next);
            }
        }
    }
    unreachable!("path is non-empty, so the loop returns")
}

/// Direct mode: invoke sync and async callables with the descriptor's args,
/// pass plain data through untouched. Callback-style callables need the
/// callback marker and are refused here.
async fn invoke_direct(found: Found<'_>, path: &Path, args: &[Value]) -> Result<Value> {
    match found {
        Found::Data(value) => Ok(value.clone()),
        Found::Entry(ContextEntry::Value(value)) => Ok(value.clone()),
        Found::Entry(ContextEntry::Map(map)) => map.to_data().map_err(|key| {
            Error::execution(
                path,
                anyhow!("entry '{path}.{key}' is callable and has no data form"),
            )
        }),
        Found::Entry(ContextEntry::Sync(f)) => {
            debug!(%path, "invoking sync callable");
            f(args.to_vec()).map_err(|source| Error::execution(path, source))
        }
        Found::Entry(ContextEntry::Async(f)) => {
            debug!(%path, "invoking async callable");
            f(args.to_vec())
                .await
                .map_err(|source| Error::execution(path, source))
        }
        Found::Entry(ContextEntry::Callback(_)) => Err(Error::execution(
            path,
            anyhow!("callback-style callable requires the callback mode"),
        )),
    }
}

/// Callback mode: invoke with the descriptor's args plus a completion
/// handle, then wait for whichever arm of the callback fires.
async fn invoke_callback(found: Found<'_>, path: &Path, args: &[Value]) -> Result<Value> {
    let Found::Entry(ContextEntry::Callback(f)) = found else {
        return Err(Error::execution(
            path,
            anyhow!("callback mode requires a callback-style callable"),
        ));
    };
    debug!(%path, "invoking callback callable");
    let (completer, outcome) = Completer::new();
    f(args.to_vec(), completer);
    match outcome.await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(Error::execution(path, source)),
        Err(_) => Err(Error::execution(
            path,
            anyhow!("completion callback dropped without being called"),
        )),
    }
}
