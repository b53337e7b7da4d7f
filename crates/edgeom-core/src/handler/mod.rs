// ── Handler interface ──
//
// Domain handlers (disk, partition, session, ...) implement
// `ResourceHandler`. The adapter never knows their concrete types: it
// resolves them by locator through the `HandlerCatalog` and talks to
// them through `HandlerMethod` + `Invocation`.

mod catalog;
mod instances;

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::CoreError;
use crate::model::{ResourcePath, Status};

pub use catalog::{HandlerCatalog, HandlerFactory};
pub use instances::InstanceCache;

// ── Methods ─────────────────────────────────────────────────────────

/// A method a handler may expose.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HandlerMethod {
    Post,
    Patch,
    Delete,
    Start,
    Stop,
    /// Getter for one sub key, e.g. `Get("all")` is `get_all_info`.
    Get(String),
}

impl HandlerMethod {
    pub fn getter(sub_key: impl Into<String>) -> Self {
        Self::Get(sub_key.into())
    }

    /// Conventional method name, used in error messages and logs.
    pub fn name(&self) -> String {
        match self {
            Self::Post => "post_request".into(),
            Self::Patch => "patch_request".into(),
            Self::Delete => "delete_request".into(),
            Self::Start => "start_request".into(),
            Self::Stop => "stop_request".into(),
            Self::Get(sub_key) => format!("get_{sub_key}_info"),
        }
    }

    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Get(_))
    }
}

impl fmt::Display for HandlerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Arguments of one handler call.
///
/// Every method gets the same shape; a handler reads as many path
/// segments as it needs.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// Request body of a mutating call.
    pub payload: Option<&'a Map<String, Value>>,
    pub path: &'a ResourcePath,
    /// Segment names declared for the model.
    pub keys: &'a [String],
    /// Refresh cycle counter (`0` outside the refresher).
    pub cycle: u32,
}

impl<'a> Invocation<'a> {
    pub fn new(path: &'a ResourcePath) -> Self {
        Self {
            payload: None,
            path,
            keys: &[],
            cycle: 0,
        }
    }

    pub fn with_payload(mut self, payload: Option<&'a Map<String, Value>>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_keys(mut self, keys: &'a [String]) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_cycle(mut self, cycle: u32) -> Self {
        self.cycle = cycle;
        self
    }
}

/// The `(status, message)` pair a handler answers with.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: Status,
    pub message: Value,
}

impl Reply {
    /// Success. Getters usually reply with this and leave their data in
    /// their own state for [`ResourceHandler::render`].
    pub fn ok() -> Self {
        Self {
            status: Status::OK,
            message: Value::Null,
        }
    }

    pub fn new(status: Status, message: impl Into<Value>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Status::NOT_EXIST, message.into())
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Non-success replies become [`CoreError::Handler`], verbatim.
    pub fn into_result(self) -> Result<Self, CoreError> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(CoreError::Handler {
                status: self.status,
                message: self.message,
            })
        }
    }
}

// ── Handler errors ──────────────────────────────────────────────────

/// Failure raised by a handler (as opposed to a non-OK [`Reply`]).
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler's own declared error; the message is forwarded.
    #[error("{0}")]
    Declared(String),

    /// Anything else. Only the error's type name is kept.
    #[error("{kind}")]
    Unexpected { kind: &'static str },
}

impl HandlerError {
    /// Wrap an arbitrary error, keeping only the short name of its type.
    pub fn unexpected<E>(_err: &E) -> Self {
        let full = std::any::type_name::<E>();
        let kind = full.rsplit("::").next().unwrap_or(full);
        Self::Unexpected { kind }
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        Self::unexpected(&err)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::unexpected(&err)
    }
}

impl From<HandlerError> for CoreError {
    fn from(err: HandlerError) -> Self {
        CoreError::Internal(err.to_string())
    }
}

// ── The handler trait ───────────────────────────────────────────────

/// A domain handler.
///
/// One instance is shared between every caller addressing the same
/// resource, so implementations keep their state behind their own
/// locks. The adapter never serializes calls into a handler.
pub trait ResourceHandler: Send + Sync + 'static {
    /// Whether this handler exposes `method`.
    fn supports(&self, method: &HandlerMethod) -> bool;

    /// Run `method`.
    fn call(&self, method: &HandlerMethod, invocation: &Invocation<'_>)
    -> Result<Reply, HandlerError>;

    /// Public state of the instance, as returned to callers.
    ///
    /// List getters leave their elements under an `"items"` field.
    fn render(&self) -> Value;
}

/// A resolved handler instance plus the method to call on it.
#[derive(Clone)]
pub struct BoundMethod {
    pub handler: Arc<dyn ResourceHandler>,
    pub method: HandlerMethod,
}

impl BoundMethod {
    /// Call the method. Handler failures and panics are reported as
    /// [`CoreError::Internal`]; non-OK replies are returned as-is.
    pub fn invoke(&self, invocation: &Invocation<'_>) -> Result<Reply, CoreError> {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.handler.call(&self.method, invocation)
        }));
        match outcome {
            Ok(result) => result.map_err(CoreError::from),
            Err(_) => Err(CoreError::Internal("panic".into())),
        }
    }

    pub fn render(&self) -> Value {
        self.handler.render()
    }
}

impl fmt::Debug for BoundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundMethod")
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}
