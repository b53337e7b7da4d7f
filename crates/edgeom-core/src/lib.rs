//! Resource adapter between domain handlers and the management front end.
//!
//! Every domain handler (disk, partition, system, network interface,
//! user, session, ...) is reached through this crate:
//!
//! - **[`Adapter`]**: Shared facade constructed once at process start.
//!   [`invoke()`](Adapter::invoke) routes inbound calls,
//!   [`fetch()`](Adapter::fetch) serves cached snapshots and calls
//!   getters on a miss, [`store()`](Adapter::store) diffs new values
//!   against the cache and propagates changes.
//!
//! - **[`ClassRegistry`]** / **[`HandlerCatalog`]**: Descriptor table
//!   (model name → implementation locator, path segment names, caching
//!   flag, refresh actions) and the startup-time table of handler
//!   constructors it selects from.
//!
//! - **[`InstanceCache`]**: At most one live handler instance per
//!   (implementation, composite key), created lazily.
//!
//! - **[`store`]**: Per-model value cache, the structural [`diff`],
//!   and the [`EventBus`] that tracks pending added/updated/removed
//!   records and broadcasts them to [`ResourceEventStream`] subscribers.
//!
//! - **[`Refresher`]**: Periodic timers that drive the same
//!   fetch/store path for polling-refreshed models.

pub mod adapter;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod model;
pub mod refresh;
pub mod registry;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use adapter::{Adapter, FetchRequest, StoreTarget};
pub use config::AdapterConfig;
pub use dispatch::{Request, SYSTEM_MODEL, Verb};
pub use error::CoreError;
pub use handler::{
    BoundMethod, HandlerCatalog, HandlerError, HandlerFactory, HandlerMethod, InstanceCache,
    Invocation, Reply, ResourceHandler,
};
pub use refresh::{RefreshTimer, Refresher, TimerAction, TimerState};
pub use registry::ClassRegistry;
pub use store::{Delta, EventBus, EventKind, ResourceEvent, diff};
pub use stream::ResourceEventStream;

pub use model::{
    ActionDescriptor, CompositeKey, ModelDescriptor, ResourcePath, Response, Status,
    TimerEntry, TimerSettings, ValueKind,
};
