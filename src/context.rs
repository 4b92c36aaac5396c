//! The context: a nested map of plain data and callables that descriptors
//! resolve against.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::oneshot;

/// Callable that returns its outcome directly.
pub type SyncFn = Arc<dyn Fn(Vec<Value>) -> anyhow::Result<Value> + Send + Sync>;

/// Callable that returns a future of its outcome.
pub type AsyncFn = Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Callable that reports through a [`Completer`] instead of returning.
pub type CallbackFn = Arc<dyn Fn(Vec<Value>, Completer) + Send + Sync>;

/// Single-use completion handle passed to callback-style callables.
///
/// Stands in for the error-first `(error, value)` callback convention:
/// exactly one of [`succeed`](Completer::succeed), [`fail`](Completer::fail)
/// or [`complete`](Completer::complete) consumes the handle. Dropping it
/// without completing fails the effect.
pub struct Completer {
    tx: oneshot::Sender<anyhow::Result<Value>>,
}

impl Completer {
    pub(crate) fn new() -> (Completer, oneshot::Receiver<anyhow::Result<Value>>) {
        let (tx, rx) = oneshot::channel();
        (Completer { tx }, rx)
    }

    /// Complete with a value, the `(null, value)` arm of the convention.
    pub fn succeed(self, value: impl Into<Value>) {
        let _ = self.tx.send(Ok(value.into()));
    }

    /// Complete with an error, the `(error, _)` arm of the convention.
    pub fn fail(self, error: impl Into<anyhow::Error>) {
        let _ = self.tx.send(Err(error.into()));
    }

    /// Complete with an already-built result.
    pub fn complete(self, result: anyhow::Result<Value>) {
        let _ = self.tx.send(result);
    }
}

impl fmt::Debug for Completer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Completer")
    }
}

/// One value in the context tree.
///
/// The variant states the capability outright, so the resolver never has to
/// guess whether a value is callable or which convention it follows.
pub enum ContextEntry {
    /// Plain data. Object interiors stay traversable by descriptor paths.
    Value(Value),
    /// A nested map of further entries.
    Map(Context),
    /// A direct-return callable.
    Sync(SyncFn),
    /// A future-returning callable.
    Async(AsyncFn),
    /// A callback-style callable.
    Callback(CallbackFn),
}

impl fmt::Debug for ContextEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextEntry::Value(value) => f.debug_tuple("Value").field(value).finish(),
            ContextEntry::Map(map) => f.debug_tuple("Map").field(map).finish(),
            ContextEntry::Sync(_) => f.write_str("Sync(..)"),
            ContextEntry::Async(_) => f.write_str("Async(..)"),
            ContextEntry::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

impl From<Value> for ContextEntry {
    fn from(value: Value) -> Self {
        ContextEntry::Value(value)
    }
}

impl From<Context> for ContextEntry {
    fn from(map: Context) -> Self {
        ContextEntry::Map(map)
    }
}

/// The environment computations run against: string keys mapped to data,
/// nested maps, or callables.
#[derive(Debug, Default)]
pub struct Context {
    entries: HashMap<String, ContextEntry>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: impl Into<ContextEntry>) {
        self.entries.insert(key.into(), entry.into());
    }

    pub fn get(&self, key: &str) -> Option<&ContextEntry> {
        self.entries.get(key)
    }

    /// Add a plain data entry.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, ContextEntry::Value(value.into()));
        self
    }

    /// Add a nested map entry.
    pub fn with_map(mut self, key: impl Into<String>, map: Context) -> Self {
        self.insert(key, ContextEntry::Map(map));
        self
    }

    /// Add a direct-return callable.
    pub fn with_sync<F>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.insert(key, ContextEntry::Sync(Arc::new(f)));
        self
    }

    /// Add a future-returning callable.
    pub fn with_async<F, Fut>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let wrapped: AsyncFn = Arc::new(move |args| Box::pin(f(args)));
        self.insert(key, ContextEntry::Async(wrapped));
        self
    }

    /// Add a callback-style callable.
    pub fn with_callback<F>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>, Completer) + Send + Sync + 'static,
    {
        self.insert(key, ContextEntry::Callback(Arc::new(f)));
        self
    }

    /// Materialize the subtree as plain data. Callable leaves have no data
    /// form; the offending key path comes back as the error.
    pub(crate) fn to_data(&self) -> std::result::Result<Value, String> {
        let mut map = serde_json::Map::new();
        for (key, entry) in &self.entries {
            let value = match entry {
                ContextEntry::Value(value) => value.clone(),
                ContextEntry::Map(inner) => inner
                    .to_data()
                    .map_err(|leaf| format!("{key}.{leaf}"))?,
                _ => return Err(key.clone()),
            };
            map.insert(key.clone(), value);
        }
        Ok(Value::Object(map))
    }
}
