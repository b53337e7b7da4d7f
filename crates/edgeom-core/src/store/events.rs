// ── Change events ──
//
// Pending-event table plus a broadcast channel. The table is
// authoritative: it records which resources changed since they were
// last read through the cache. The channel is best-effort.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use tokio::sync::broadcast;
use tracing::trace;

use crate::model::CompositeKey;

/// Kind of change observed on a resource.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, EnumIter,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Added,
    Updated,
    Removed,
}

/// One change, as broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceEvent {
    pub kind: EventKind,
    pub key: CompositeKey,
    pub at: DateTime<Utc>,
}

pub struct EventBus {
    pending: Mutex<HashMap<EventKind, HashSet<CompositeKey>>>,
    sender: broadcast::Sender<Arc<ResourceEvent>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        let pending = EventKind::iter().map(|kind| (kind, HashSet::new())).collect();
        Self {
            pending: Mutex::new(pending),
            sender,
        }
    }

    /// Record and broadcast a change.
    ///
    /// A removal supersedes the key's added/updated records and an
    /// addition supersedes its removal, so a key is never pending as
    /// both present and gone.
    pub fn emit(&self, kind: EventKind, key: CompositeKey) {
        {
            let mut pending = self.pending.lock();
            let superseded: &[EventKind] = match kind {
                EventKind::Added => &[EventKind::Removed],
                EventKind::Updated => &[],
                EventKind::Removed => &[EventKind::Added, EventKind::Updated],
            };
            for other in superseded {
                if let Some(keys) = pending.get_mut(other) {
                    keys.remove(&key);
                }
            }
            pending.entry(kind).or_default().insert(key.clone());
        }

        let event = Arc::new(ResourceEvent {
            kind,
            key,
            at: Utc::now(),
        });
        // No receivers is fine: the pending table keeps the record.
        if self.sender.send(event).is_err() {
            trace!("no event subscribers");
        }
    }

    /// A cached read of `key` happened: its added/updated records are consumed.
    pub fn clear_read(&self, key: &CompositeKey) {
        let mut pending = self.pending.lock();
        for kind in [EventKind::Added, EventKind::Updated] {
            if let Some(keys) = pending.get_mut(&kind) {
                keys.remove(key);
            }
        }
    }

    /// Drop every pending record of `key`. Used when its resource is purged.
    pub fn forget(&self, key: &CompositeKey) {
        for keys in self.pending.lock().values_mut() {
            keys.remove(key);
        }
    }

    /// Keys with a pending record of `kind`, sorted.
    pub fn pending(&self, kind: EventKind) -> Vec<CompositeKey> {
        let mut keys: Vec<CompositeKey> = self
            .pending
            .lock()
            .get(&kind)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn is_pending(&self, kind: EventKind, key: &CompositeKey) -> bool {
        self.pending
            .lock()
            .get(&kind)
            .is_some_and(|keys| keys.contains(key))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ResourceEvent>> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::ResourcePath;

    fn key(model: &str) -> CompositeKey {
        CompositeKey::new(model, ResourcePath::root())
    }

    #[test]
    fn emit_records_and_broadcasts() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.emit(EventKind::Updated, key("Disk"));

        assert!(bus.is_pending(EventKind::Updated, &key("Disk")));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, EventKind::Updated);
        assert_eq!(event.key, key("Disk"));
    }

    #[test]
    fn cached_read_clears_added_and_updated_only() {
        let bus = EventBus::new(8);
        bus.emit(EventKind::Added, key("Disk"));
        bus.emit(EventKind::Updated, key("Disk"));
        bus.emit(EventKind::Removed, key("Disk"));

        bus.clear_read(&key("Disk"));

        assert!(bus.pending(EventKind::Added).is_empty());
        assert!(bus.pending(EventKind::Updated).is_empty());
        assert_eq!(bus.pending(EventKind::Removed), vec![key("Disk")]);
    }

    #[test]
    fn removal_and_addition_supersede_each_other() {
        let bus = EventBus::new(8);
        bus.emit(EventKind::Added, key("Nic"));
        bus.emit(EventKind::Updated, key("Nic"));

        bus.emit(EventKind::Removed, key("Nic"));
        assert!(bus.pending(EventKind::Added).is_empty());
        assert!(bus.pending(EventKind::Updated).is_empty());
        assert_eq!(bus.pending(EventKind::Removed), vec![key("Nic")]);

        bus.emit(EventKind::Added, key("Nic"));
        assert_eq!(bus.pending(EventKind::Added), vec![key("Nic")]);
        assert!(bus.pending(EventKind::Removed).is_empty());

        bus.emit(EventKind::Updated, key("Nic"));
        assert!(bus.is_pending(EventKind::Added, &key("Nic")));
        assert!(bus.is_pending(EventKind::Updated, &key("Nic")));
    }

    #[test]
    fn forget_drops_every_kind() {
        let bus = EventBus::new(8);
        bus.emit(EventKind::Added, key("Nic"));
        bus.emit(EventKind::Updated, key("Nic"));
        bus.emit(EventKind::Removed, key("Disk"));

        bus.forget(&key("Nic"));
        bus.forget(&key("Disk"));

        for kind in EventKind::iter() {
            assert!(bus.pending(kind).is_empty(), "{kind} still pending");
        }
    }

    #[test]
    fn emit_without_subscribers_is_fine() {
        let bus = EventBus::new(1);
        bus.emit(EventKind::Removed, key("Nic"));
        bus.emit(EventKind::Removed, key("Nic"));
        assert_eq!(bus.pending(EventKind::Removed).len(), 1);
    }

    #[test]
    fn kind_display() {
        assert_eq!(EventKind::Added.to_string(), "added");
        assert_eq!("removed".parse::<EventKind>().unwrap(), EventKind::Removed);
    }
}
