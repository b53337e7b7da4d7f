// ── Resource store ──
//
// Per-model value cache, the structural differ, and the change-event
// bus. The adapter drives them; see `adapter::store` for the store
// operation that ties them together.

mod cache;
mod diff;
mod events;

pub use cache::{CachedValue, ResourceCache};
pub use diff::{Delta, diff};
pub use events::{EventBus, EventKind, ResourceEvent};
