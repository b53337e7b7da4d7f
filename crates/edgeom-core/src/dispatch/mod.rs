// ── Request dispatch ──
//
// Routes an inbound (model, verb, payload, path) call to the resolved
// handler method and normalizes the outcome to `{status, message}`.
// GET goes through the cached fetch path; every other verb calls a
// fresh handler instance and answers with that instance's state.

pub mod payload;

use serde::Deserialize;
use serde_json::{Map, Value};
use strum::{Display, EnumIter, EnumString};
use tracing::{error, info, warn};

use crate::adapter::{Adapter, FetchRequest};
use crate::error::CoreError;
use crate::handler::{HandlerMethod, Invocation, Reply};
use crate::model::{MAX_DEPTH, ResourcePath, Response};

/// Model whose full snapshot is re-fetched after a successful mutation of it.
pub const SYSTEM_MODEL: &str = "System";

// ── Verbs ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Post,
    Patch,
    Delete,
    Start,
    Stop,
}

impl Verb {
    /// Handler method of a mutating verb. `GET` maps to a getter chosen
    /// by the fetch path, so it has none here.
    pub fn method(self) -> Option<HandlerMethod> {
        match self {
            Self::Get => None,
            Self::Post => Some(HandlerMethod::Post),
            Self::Patch => Some(HandlerMethod::Patch),
            Self::Delete => Some(HandlerMethod::Delete),
            Self::Start => Some(HandlerMethod::Start),
            Self::Stop => Some(HandlerMethod::Stop),
        }
    }

    /// START and STOP are reserved for the refresher.
    pub fn is_inbound(self) -> bool {
        !matches!(self, Self::Start | Self::Stop)
    }
}

// ── Requests ────────────────────────────────────────────────────────

/// One inbound call.
///
/// `verb` and `need_list` stay untyped until dispatch so that bad
/// values become error responses rather than decode failures.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "WireRequest")]
pub struct Request {
    pub model: String,
    pub verb: String,
    pub payload: Option<Value>,
    pub need_list: Value,
    pub path: ResourcePath,
}

impl Request {
    pub fn new(model: impl Into<String>, verb: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            verb: verb.into(),
            payload: None,
            need_list: Value::Bool(false),
            path: ResourcePath::root(),
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_need_list(mut self, need_list: impl Into<Value>) -> Self {
        self.need_list = need_list.into();
        self
    }

    pub fn at(mut self, path: ResourcePath) -> Self {
        self.path = path;
        self
    }

    /// Decode a request from JSON text. Duplicate keys are rejected.
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let value = payload::parse_strict(text)?;
        serde_json::from_value(value)
            .map_err(|e| CoreError::InvalidInput(format!("Request model is invalid: {e}")))
    }

    fn need_list(&self) -> bool {
        match &self.need_list {
            Value::Bool(flag) => *flag,
            Value::Null => false,
            other => {
                warn!(model = %self.model, need_list = %other, "needList is not a boolean, using false");
                false
            }
        }
    }
}

/// Transport shape of a request.
#[derive(Deserialize)]
struct WireRequest {
    model_name: String,
    request_type: String,
    #[serde(default)]
    request_data: Option<Value>,
    #[serde(default)]
    need_list: Value,
    #[serde(default)]
    item1: Option<String>,
    #[serde(default)]
    item2: Option<String>,
    #[serde(default)]
    item3: Option<String>,
    #[serde(default)]
    item4: Option<String>,
}

impl TryFrom<WireRequest> for Request {
    type Error = CoreError;

    fn try_from(wire: WireRequest) -> Result<Self, Self::Error> {
        let slots: [Option<String>; MAX_DEPTH] = [wire.item1, wire.item2, wire.item3, wire.item4];
        Ok(Self {
            model: wire.model_name,
            verb: wire.request_type,
            payload: wire.request_data,
            need_list: wire.need_list,
            path: ResourcePath::from_slots(slots)?,
        })
    }
}

// ── Dispatch ────────────────────────────────────────────────────────

impl Adapter {
    /// Handle one inbound call. Never fails: errors become responses.
    pub fn invoke(&self, request: &Request) -> Response {
        info!(
            model = %request.model,
            verb = %request.verb,
            path = %request.path,
            "request start"
        );
        let response = match self.try_invoke(request) {
            Ok(message) => Response::ok(message),
            Err(e) => e.to_response(),
        };
        info!(model = %request.model, status = %response.status, "request end");
        response
    }

    /// Internal call path (refresher, bootstrap). Accepts every verb,
    /// including START and STOP.
    pub fn request(
        &self,
        model: &str,
        verb: Verb,
        payload: Option<&Map<String, Value>>,
        path: &ResourcePath,
    ) -> Response {
        let result = match verb.method() {
            None => self.fetch(&FetchRequest::new(model, "all").at(path.clone())),
            Some(method) => self.mutate(model, method, payload, path, false),
        };
        match result {
            Ok(message) => Response::ok(message),
            Err(e) => e.to_response(),
        }
    }

    fn try_invoke(&self, request: &Request) -> Result<Value, CoreError> {
        self.registry().lookup(&request.model)?;

        let verb: Verb = request
            .verb
            .parse()
            .map_err(|_| CoreError::InvalidVerb(request.verb.clone()))?;
        if !verb.is_inbound() {
            return Err(CoreError::InvalidVerb(request.verb.clone()));
        }

        let need_list = request.need_list();
        let Some(method) = verb.method() else {
            let fetch = FetchRequest::new(&request.model, "all")
                .list(need_list)
                .at(request.path.clone());
            return self.fetch(&fetch);
        };

        let payload = payload::validate(request.payload.as_ref())?;
        self.mutate(&request.model, method, payload.as_ref(), &request.path, need_list)
    }

    fn mutate(
        &self,
        model: &str,
        method: HandlerMethod,
        payload: Option<&Map<String, Value>>,
        path: &ResourcePath,
        need_list: bool,
    ) -> Result<Value, CoreError> {
        let descriptor = self.registry().lookup(model)?;
        info!(model, %method, "mutation start");

        let bound = self
            .instances()
            .resolve(&descriptor.implementation, method, None, false)?;
        let invocation = Invocation::new(path)
            .with_payload(payload)
            .with_keys(&descriptor.keys);
        bound
            .invoke(&invocation)
            .and_then(Reply::into_result)
            .inspect_err(|e| error!(model, method = %bound.method, error = %e, "mutation failed"))?;

        info!(model, method = %bound.method, "mutation end");
        self.refresh_dependents(model, need_list);
        Ok(bound.render())
    }

    /// Re-fetch and cache snapshots that a mutation of `model` invalidates.
    fn refresh_dependents(&self, model: &str, need_list: bool) {
        if model != SYSTEM_MODEL {
            return;
        }
        let fetch = FetchRequest::new(SYSTEM_MODEL, "all")
            .list(need_list)
            .cached(false);
        match self.fetch(&fetch) {
            Ok(_) => info!(model = SYSTEM_MODEL, "snapshot refreshed after mutation"),
            Err(e) => warn!(model = SYSTEM_MODEL, error = %e, "snapshot refresh after mutation failed"),
        }
    }
}
