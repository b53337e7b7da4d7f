// ── Domain model ──
//
// Identity types for resources, the boot-time descriptor table format,
// and helpers over JSON resource values.

pub mod descriptor;
pub mod key;
pub mod value;

pub use descriptor::{
    ActionDescriptor, MAX_INTERVAL_SECS, ModelDescriptor, TimerEntry, TimerSettings,
    split_action_key,
};
pub use key::{CompositeKey, MAX_DEPTH, ResourcePath};
pub use value::{ValueKind, is_empty_container, segment_id, string_form};

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Status codes ────────────────────────────────────────────────────

/// HTTP-flavoured status code carried in every reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(pub u16);

impl Status {
    pub const OK: Self = Self(200);
    pub const ERROR: Self = Self(400);
    pub const NOT_EXIST: Self = Self(404);
    pub const INTERNAL_ERROR: Self = Self(500);

    /// Handlers report success as either `0` or `200`.
    pub fn is_ok(self) -> bool {
        self.0 == 0 || self == Self::OK
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Uniform `{status, message}` shape returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    pub message: Value,
}

impl Response {
    pub fn ok(message: Value) -> Self {
        Self {
            status: Status::OK,
            message,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}
