//! Effect descriptors: the `[mode?, path, ...args]` wire shape.
//!
//! A descriptor names a location in a [`Context`](crate::context::Context)
//! and, optionally, how to invoke whatever lives there. Descriptors carry no
//! behavior of their own; the resolver gives them meaning.

use std::fmt;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use serde_json::Value;

use crate::error::{Error, Result};

/// Leading wire marker for parallel groups.
pub const PARALLEL_MARKER: &str = "@parallel";

/// Leading wire marker for callback-style calls.
pub const CALLBACK_MARKER: &str = "@callback";

/// How a descriptor asks to be executed.
///
/// On the wire the mode rides as an optional leading marker string; in
/// memory the [`Effect`] variant carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// No marker: walk the path, invoke directly if callable.
    Direct,
    /// `@parallel`: trailing elements are nested descriptors run concurrently.
    Parallel,
    /// `@callback`: the callable reports through an error-first callback.
    Callback,
}

impl Mode {
    fn from_marker(marker: &str) -> Option<Mode> {
        match marker {
            PARALLEL_MARKER => Some(Mode::Parallel),
            CALLBACK_MARKER => Some(Mode::Callback),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Direct => write!(f, "direct"),
            Mode::Parallel => write!(f, "parallel"),
            Mode::Callback => write!(f, "callback"),
        }
    }
}

/// An ordered sequence of string keys into the context.
///
/// A bare string on the wire is a single key. It is never split on dots, so
/// `"a.b"` names one key that happens to contain a dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Path {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl From<&str> for Path {
    fn from(key: &str) -> Self {
        Path::new([key])
    }
}

impl From<String> for Path {
    fn from(key: String) -> Self {
        Path::new([key])
    }
}

impl From<Vec<String>> for Path {
    fn from(segments: Vec<String>) -> Self {
        Path { segments }
    }
}

impl<const N: usize> From<[&str; N]> for Path {
    fn from(segments: [&str; N]) -> Self {
        Path::new(segments)
    }
}

/// A side effect described as data.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// `[path, ...args]`: resolve the path; if the value is callable, invoke
    /// it with `args`, otherwise the value itself is the outcome.
    Call { path: Path, args: Vec<Value> },
    /// `["@callback", path, ...args]`: invoke the callable with `args` plus
    /// a completion callback in the trailing position.
    CallbackCall { path: Path, args: Vec<Value> },
    /// `["@parallel", ...descriptors]`: resolve every nested descriptor
    /// concurrently; outcomes are reassembled in input order.
    Parallel(Vec<Effect>),
}

impl Effect {
    /// Descriptor that reads the value at `path`.
    pub fn read(path: impl Into<Path>) -> Self {
        Effect::Call {
            path: path.into(),
            args: Vec::new(),
        }
    }

    /// Descriptor that calls the value at `path` with `args`.
    pub fn call<I>(path: impl Into<Path>, args: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Effect::Call {
            path: path.into(),
            args: args.into_iter().collect(),
        }
    }

    /// Descriptor that calls the callback-style value at `path` with `args`.
    pub fn callback<I>(path: impl Into<Path>, args: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        Effect::CallbackCall {
            path: path.into(),
            args: args.into_iter().collect(),
        }
    }

    /// Descriptor that runs `effects` concurrently.
    pub fn parallel<I>(effects: I) -> Self
    where
        I: IntoIterator<Item = Effect>,
    {
        Effect::Parallel(effects.into_iter().collect())
    }

    pub fn mode(&self) -> Mode {
        match self {
            Effect::Call { .. } => Mode::Direct,
            Effect::CallbackCall { .. } => Mode::Callback,
            Effect::Parallel(_) => Mode::Parallel,
        }
    }

    /// The context path, absent for parallel groups.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Effect::Call { path, .. } | Effect::CallbackCall { path, .. } => Some(path),
            Effect::Parallel(_) => None,
        }
    }

    /// Call arguments, empty for parallel groups.
    pub fn args(&self) -> &[Value] {
        match self {
            Effect::Call { args, .. } | Effect::CallbackCall { args, .. } => args,
            Effect::Parallel(_) => &[],
        }
    }

    /// Nested descriptors of a parallel group.
    pub fn nested(&self) -> Option<&[Effect]> {
        match self {
            Effect::Parallel(effects) => Some(effects),
            _ => None,
        }
    }

    /// Parse a descriptor from its wire form.
    pub fn from_value(value: &Value) -> Result<Effect> {
        let items = value
            .as_array()
            .ok_or_else(|| Error::malformed(format!("expected an array, got {value}")))?;
        if items.is_empty() {
            return Err(Error::malformed("descriptor is empty"));
        }

        let (mode, rest) = match items[0].as_str().and_then(Mode::from_marker) {
            Some(mode) => (mode, &items[1..]),
            None => (Mode::Direct, &items[..]),
        };

        if mode == Mode::Parallel {
            let nested = rest.iter().map(Effect::from_value).collect::<Result<_>>()?;
            return Ok(Effect::Parallel(nested));
        }

        let (head, args) = rest
            .split_first()
            .ok_or_else(|| Error::malformed("descriptor has no path"))?;
        let path = parse_path(head)?;
        let args = args.to_vec();
        Ok(match mode {
            Mode::Callback => Effect::CallbackCall { path, args },
            _ => Effect::Call { path, args },
        })
    }

    /// Render the descriptor in its wire form.
    pub fn to_value(&self) -> Value {
        match self {
            Effect::Call { path, args } => {
                let mut items = vec![path_value(path)];
                items.extend(args.iter().cloned());
                Value::Array(items)
            }
            Effect::CallbackCall { path, args } => {
                let mut items = vec![Value::from(CALLBACK_MARKER), path_value(path)];
                items.extend(args.iter().cloned());
                Value::Array(items)
            }
            Effect::Parallel(effects) => {
                let mut items = vec![Value::from(PARALLEL_MARKER)];
                items.extend(effects.iter().map(Effect::to_value));
                Value::Array(items)
            }
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

fn parse_path(value: &Value) -> Result<Path> {
    match value {
        Value::String(key) => Ok(Path::new([key.clone()])),
        Value::Array(items) => {
            if items.is_empty() {
                return Err(Error::malformed("path has no segments"));
            }
            let segments = items
                .iter()
                .map(|item| {
                    item.as_str().map(str::to_owned).ok_or_else(|| {
                        Error::malformed(format!("path segment must be a string, got {item}"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Path::from(segments))
        }
        other => Err(Error::malformed(format!(
            "path must be a string or array of strings, got {other}"
        ))),
    }
}

/// Single-segment paths print as a bare string unless the key would be
/// mistaken for a mode marker.
fn path_value(path: &Path) -> Value {
    match path.segments() {
        [key] if Mode::from_marker(key).is_none() => Value::from(key.as_str()),
        segments => Value::Array(segments.iter().map(|s| Value::from(s.as_str())).collect()),
    }
}

impl Serialize for Effect {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Effect {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Effect, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Effect::from_value(&value).map_err(serde::de::Error::custom)
    }
}
