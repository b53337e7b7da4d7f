// End-to-end tests for the resource adapter, driven through fake
// handlers registered in a `HandlerCatalog`.
#![allow(clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use futures_util::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use edgeom_core::{
    ActionDescriptor, Adapter, AdapterConfig, ClassRegistry, CompositeKey, EventKind,
    FetchRequest, HandlerCatalog, HandlerError, HandlerMethod, Invocation, ModelDescriptor, Reply,
    Request, ResourceHandler, ResourcePath, Status, StoreTarget, Verb,
};

// ── Fake handlers ───────────────────────────────────────────────────

/// Shared state the fake handlers read from, standing in for the device.
#[derive(Default)]
struct Device {
    disk: Mutex<Value>,
    partitions: Mutex<Vec<String>>,
    getter_calls: AtomicUsize,
    partition_instances: AtomicUsize,
}

struct DiskHandler {
    device: Arc<Device>,
    state: Mutex<Value>,
}

impl ResourceHandler for DiskHandler {
    fn supports(&self, method: &HandlerMethod) -> bool {
        match method {
            HandlerMethod::Get(sub_key) => sub_key == "all" || sub_key == "health",
            HandlerMethod::Post | HandlerMethod::Patch => true,
            _ => false,
        }
    }

    fn call(&self, method: &HandlerMethod, invocation: &Invocation<'_>) -> Result<Reply, HandlerError> {
        match method {
            HandlerMethod::Get(sub_key) => {
                self.device.getter_calls.fetch_add(1, Ordering::SeqCst);
                let disk = self.device.disk.lock().unwrap().clone();
                *self.state.lock().unwrap() = if sub_key == "health" {
                    json!({ "h": disk.get("h").cloned().unwrap_or(Value::Null) })
                } else {
                    disk
                };
                Ok(Reply::ok())
            }
            _ => {
                let payload = invocation.payload.cloned().unwrap_or_default();
                *self.state.lock().unwrap() = Value::Object(payload);
                Ok(Reply::ok())
            }
        }
    }

    fn render(&self) -> Value {
        self.state.lock().unwrap().clone()
    }
}

struct PartitionHandler {
    device: Arc<Device>,
    state: Mutex<Value>,
}

impl ResourceHandler for PartitionHandler {
    fn supports(&self, method: &HandlerMethod) -> bool {
        matches!(method, HandlerMethod::Get(k) if k == "all")
    }

    fn call(&self, _: &HandlerMethod, invocation: &Invocation<'_>) -> Result<Reply, HandlerError> {
        self.device.getter_calls.fetch_add(1, Ordering::SeqCst);
        let state = match invocation.path.get(1) {
            Some(part) => json!({ "name": part, "size": 512 }),
            None => json!({ "items": self.device.partitions.lock().unwrap().clone() }),
        };
        *self.state.lock().unwrap() = state;
        Ok(Reply::ok())
    }

    fn render(&self) -> Value {
        self.state.lock().unwrap().clone()
    }
}

#[derive(Default)]
struct SystemHandler {
    hostname: Mutex<String>,
}

impl ResourceHandler for SystemHandler {
    fn supports(&self, method: &HandlerMethod) -> bool {
        matches!(method, HandlerMethod::Get(k) if k == "all")
            || matches!(
                method,
                HandlerMethod::Post | HandlerMethod::Start | HandlerMethod::Stop
            )
    }

    fn call(&self, method: &HandlerMethod, invocation: &Invocation<'_>) -> Result<Reply, HandlerError> {
        let mut hostname = self.hostname.lock().unwrap();
        match method {
            HandlerMethod::Post => {
                let name = invocation
                    .payload
                    .and_then(|p| p.get("hostname"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| HandlerError::Declared("hostname is required".into()))?;
                name.clone_into(&mut hostname);
            }
            HandlerMethod::Get(_) => "edge-01".clone_into(&mut hostname),
            _ => {}
        }
        Ok(Reply::ok())
    }

    fn render(&self) -> Value {
        json!({ "hostname": *self.hostname.lock().unwrap() })
    }
}

#[derive(Default)]
struct BrokenHandler;

impl ResourceHandler for BrokenHandler {
    fn supports(&self, method: &HandlerMethod) -> bool {
        matches!(method, HandlerMethod::Post | HandlerMethod::Patch)
    }

    fn call(&self, method: &HandlerMethod, _: &Invocation<'_>) -> Result<Reply, HandlerError> {
        match method {
            HandlerMethod::Post => panic!("driver crashed"),
            _ => Ok(Reply::new(Status::ERROR, json!({ "detail": "read-only volume" }))),
        }
    }

    fn render(&self) -> Value {
        json!({})
    }
}

/// Answers every lookup as an unauthenticated session would.
#[derive(Default)]
struct SessionHandler;

impl ResourceHandler for SessionHandler {
    fn supports(&self, method: &HandlerMethod) -> bool {
        matches!(method, HandlerMethod::Get(k) if k == "all")
    }

    fn call(&self, _: &HandlerMethod, _: &Invocation<'_>) -> Result<Reply, HandlerError> {
        Ok(Reply::not_found("Session not found."))
    }

    fn render(&self) -> Value {
        json!({})
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn registry() -> ClassRegistry {
    let mut models = BTreeMap::new();
    models.insert(
        "Disk".to_owned(),
        ModelDescriptor::new("systems.disk.Disk")
            .with_keys(["disk"])
            .with_action("Disk_health", ActionDescriptor::default()),
    );
    models.insert(
        "Partition".to_owned(),
        ModelDescriptor::new("systems.disk.Partition")
            .with_keys(["disk", "part"])
            .with_action(
                "Partition_all",
                ActionDescriptor {
                    has_list: true,
                    child_resource_path: Some("PartitionUsage".into()),
                    ..ActionDescriptor::default()
                },
            ),
    );
    models.insert(
        "PartitionUsage".to_owned(),
        ModelDescriptor::new("systems.disk.PartitionUsage").with_keys(["disk", "part"]),
    );
    models.insert("System".to_owned(), ModelDescriptor::new("systems.System"));
    models.insert("Broken".to_owned(), ModelDescriptor::new("systems.Broken"));
    models.insert(
        "Session".to_owned(),
        ModelDescriptor::new("user.Session").with_keys(["session"]).local(),
    );
    ClassRegistry::new(models)
}

fn setup() -> (Arc<Device>, Adapter) {
    let device = Arc::new(Device::default());
    *device.disk.lock().unwrap() = json!({ "h": "OK", "temp": 30 });
    *device.partitions.lock().unwrap() = vec!["p1".into(), "p2".into()];

    let mut catalog = HandlerCatalog::new();
    let disk_device = Arc::clone(&device);
    catalog.register_with("systems.disk.Disk", move || {
        Arc::new(DiskHandler {
            device: Arc::clone(&disk_device),
            state: Mutex::new(Value::Null),
        }) as Arc<dyn ResourceHandler>
    });
    let part_device = Arc::clone(&device);
    catalog.register_with("systems.disk.Partition", move || {
        part_device.partition_instances.fetch_add(1, Ordering::SeqCst);
        Arc::new(PartitionHandler {
            device: Arc::clone(&part_device),
            state: Mutex::new(Value::Null),
        }) as Arc<dyn ResourceHandler>
    });
    catalog
        .register::<SystemHandler>("systems.System")
        .register::<BrokenHandler>("systems.Broken")
        .register::<SessionHandler>("user.Session");

    let adapter = Adapter::new(AdapterConfig::default(), registry(), catalog);
    (device, adapter)
}

fn path(segments: &[&str]) -> ResourcePath {
    ResourcePath::new(segments.iter().copied()).unwrap()
}

// ── Reads ───────────────────────────────────────────────────────────

#[test]
fn test_cached_read_makes_no_handler_call() {
    let (device, adapter) = setup();
    let sda = path(&["sda"]);
    let request = FetchRequest::new("Disk", "all").at(sda.clone());

    let first = adapter.fetch(&request).unwrap();
    let second = adapter.fetch(&request).unwrap();

    assert_eq!(first, json!({ "h": "OK", "temp": 30 }));
    assert_eq!(second, first);
    assert_eq!(device.getter_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_cached_read_consumes_pending_update() {
    let (device, adapter) = setup();
    let sda = path(&["sda"]);
    adapter
        .fetch(&FetchRequest::new("Disk", "all").at(sda.clone()))
        .unwrap();

    *device.disk.lock().unwrap() = json!({ "h": "OK", "temp": 41 });
    adapter
        .fetch(&FetchRequest::new("Disk", "all").at(sda.clone()).cached(false))
        .unwrap();
    let key = CompositeKey::new("Disk", sda.clone());
    assert_eq!(adapter.pending(EventKind::Updated), vec![key]);

    adapter
        .fetch(&FetchRequest::new("Disk", "all").at(sda))
        .unwrap();
    assert!(adapter.pending(EventKind::Updated).is_empty());
}

#[test]
fn test_partial_view_ignores_nulls_against_full_snapshot() {
    let (_, adapter) = setup();
    let sda = path(&["sda"]);
    adapter
        .store(json!({ "x": 1, "y": 2 }), &StoreTarget::new("Disk", "all", &sda))
        .unwrap();

    let delta = adapter
        .store(json!({ "x": 1, "y": null }), &StoreTarget::new("Disk", "status", &sda))
        .unwrap()
        .unwrap();

    assert!(!delta.is_changed());
    assert_eq!(adapter.cached("Disk", "all", &sda), Some(json!({ "x": 1, "y": 2 })));
}

#[test]
fn test_partial_view_change_is_merged_into_full_snapshot() {
    let (_, adapter) = setup();
    let sda = path(&["sda"]);
    adapter
        .store(json!({ "x": 1, "y": 2 }), &StoreTarget::new("Disk", "all", &sda))
        .unwrap();

    let delta = adapter
        .store(json!({ "x": 5 }), &StoreTarget::new("Disk", "status", &sda))
        .unwrap()
        .unwrap();

    assert!(delta.is_changed());
    assert_eq!(adapter.cached("Disk", "all", &sda), Some(json!({ "x": 5, "y": 2 })));
    assert_eq!(adapter.cached("Disk", "status", &sda), Some(json!({ "x": 5 })));
}

#[test]
fn test_same_view_null_is_a_change() {
    let (_, adapter) = setup();
    let sda = path(&["sda"]);
    let target = StoreTarget::new("Disk", "health", &sda);
    adapter.store(json!({ "h": "OK" }), &target).unwrap();

    let delta = adapter.store(json!({ "h": null }), &target).unwrap().unwrap();

    assert!(delta.is_changed());
    assert_eq!(
        adapter.pending(EventKind::Updated),
        vec![CompositeKey::new("Disk", sda)]
    );
}

#[test]
fn test_concurrent_first_access_creates_one_instance() {
    let (device, adapter) = setup();
    let p1 = path(&["sda", "p1"]);
    let barrier = Arc::new(Barrier::new(8));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let adapter = adapter.clone();
            let barrier = Arc::clone(&barrier);
            let p1 = p1.clone();
            thread::spawn(move || {
                barrier.wait();
                adapter
                    .fetch(&FetchRequest::new("Partition", "all").at(p1).cached(false))
                    .unwrap()
            })
        })
        .collect();
    for worker in workers {
        assert_eq!(worker.join().unwrap(), json!({ "name": "p1", "size": 512 }));
    }

    assert_eq!(device.partition_instances.load(Ordering::SeqCst), 1);
    assert!(
        adapter
            .instances()
            .is_cached("systems.disk.Partition", &CompositeKey::new("Partition", p1))
    );
}

#[test]
fn test_removed_partition_cascades() {
    let (device, adapter) = setup();
    let sda = path(&["sda"]);
    let p1 = path(&["sda", "p1"]);
    let children = vec!["PartitionUsage".to_owned()];
    let list = FetchRequest::new("Partition", "all")
        .list(true)
        .cached(false)
        .at(sda.clone())
        .children(children);

    assert_eq!(adapter.fetch(&list).unwrap(), json!(["p1", "p2"]));
    adapter
        .fetch(&FetchRequest::new("Partition", "all").at(p1.clone()).cached(false))
        .unwrap();
    adapter
        .store(json!({ "used": 10 }), &StoreTarget::new("PartitionUsage", "all", &p1))
        .unwrap();
    let p1_key = CompositeKey::new("Partition", p1.clone());
    assert!(adapter.instances().is_cached("systems.disk.Partition", &p1_key));

    *device.partitions.lock().unwrap() = vec!["p2".into(), "p3".into()];
    assert_eq!(adapter.fetch(&list).unwrap(), json!(["p2", "p3"]));

    assert!(adapter.cached("Partition", "all", &p1).is_none());
    assert!(adapter.cached("PartitionUsage", "all", &p1).is_none());
    assert!(!adapter.instances().is_cached("systems.disk.Partition", &p1_key));
    assert_eq!(adapter.pending(EventKind::Removed), vec![p1_key]);
    assert_eq!(
        adapter.pending(EventKind::Added),
        vec![CompositeKey::new("Partition", path(&["sda", "p3"]))]
    );
    assert_eq!(adapter.cached("Partition", "items", &sda), Some(json!(["p2", "p3"])));
}

#[test]
fn test_refresh_promotes_first_read_to_full_snapshot() {
    let (_, adapter) = setup();
    let sda = path(&["sda"]);

    adapter
        .refresh(FetchRequest::new("Disk", "health").at(sda.clone()))
        .unwrap();
    assert_eq!(adapter.cached("Disk", "all", &sda), Some(json!({ "h": "OK", "temp": 30 })));
    assert!(adapter.cached("Disk", "health", &sda).is_none());

    adapter
        .refresh(FetchRequest::new("Disk", "health").at(sda.clone()))
        .unwrap();
    assert_eq!(adapter.cached("Disk", "health", &sda), Some(json!({ "h": "OK" })));
}

// ── Dispatch ────────────────────────────────────────────────────────

#[test]
fn test_unknown_model_is_not_found() {
    let (_, adapter) = setup();
    let response = adapter.invoke(&Request::new("Fan", "GET"));
    assert_eq!(response.status, Status::NOT_EXIST);
    assert_eq!(response.message, json!("Model name: Fan is not found."));
}

#[test]
fn test_unsupported_verb_is_rejected() {
    let (_, adapter) = setup();
    let response = adapter.invoke(&Request::new("Disk", "PUT"));
    assert_eq!(response.status, Status::ERROR);
    assert_eq!(response.message, json!("Request type: PUT is not supported."));

    let response = adapter.invoke(&Request::new("System", "START"));
    assert_eq!(response.status, Status::ERROR);
    assert_eq!(response.message, json!("Request type: START is not supported."));
}

#[test]
fn test_internal_request_accepts_start() {
    let (_, adapter) = setup();
    let response = adapter.request("System", Verb::Start, None, &ResourcePath::root());
    assert!(response.is_ok());
}

#[test]
fn test_get_serves_list_view() {
    let (_, adapter) = setup();
    let request = Request::new("Partition", "GET")
        .with_need_list(true)
        .at(path(&["sda"]));

    let response = adapter.invoke(&request);

    assert!(response.is_ok());
    assert_eq!(response.message, json!(["p1", "p2"]));
}

#[test]
fn test_payload_validation() {
    let (_, adapter) = setup();

    let dup = Request::new("Disk", "PATCH").with_payload(json!(r#"{"a": 1, "a": 2}"#));
    let response = adapter.invoke(&dup);
    assert_eq!(response.status, Status::ERROR);
    assert_eq!(response.message, json!("Duplicate attributes: a."));

    let list = Request::new("Disk", "PATCH").with_payload(json!([1, 2]));
    let response = adapter.invoke(&list);
    assert_eq!(response.status, Status::ERROR);
    assert_eq!(response.message, json!("Request data is not json."));

    let text = Request::new("Disk", "PATCH").with_payload(json!(r#"{"label": "data"}"#));
    let response = adapter.invoke(&text);
    assert!(response.is_ok());
    assert_eq!(response.message, json!({ "label": "data" }));
}

#[test]
fn test_handler_failures_become_responses() {
    let (_, adapter) = setup();

    let response = adapter.invoke(&Request::new("Broken", "PATCH").with_payload(json!({})));
    assert_eq!(response.status, Status::ERROR);
    assert_eq!(response.message, json!({ "detail": "read-only volume" }));

    let response = adapter.invoke(&Request::new("Broken", "POST").with_payload(json!({})));
    assert_eq!(response.status, Status::INTERNAL_ERROR);
    assert_eq!(response.message, json!("panic"));

    let response = adapter.invoke(&Request::new("System", "POST").with_payload(json!({})));
    assert_eq!(response.status, Status::INTERNAL_ERROR);
    assert_eq!(response.message, json!("hostname is required"));
}

#[test]
fn test_benign_not_found_still_reaches_caller() {
    let (_, adapter) = setup();

    let response = adapter.invoke(&Request::new("Session", "GET"));
    assert_eq!(response.status, Status::NOT_EXIST);
    assert_eq!(response.message, json!("Session not found."));

    let response = adapter.invoke(&Request::new("Session", "GET").at(path(&["s1"])));
    assert_eq!(response.status, Status::NOT_EXIST);
    assert_eq!(response.message, json!("Session not found."));
    assert!(adapter.cached("Session", "all", &ResourcePath::root()).is_none());
}

#[test]
fn test_system_mutation_refreshes_snapshot() {
    let (_, adapter) = setup();
    let root = ResourcePath::root();
    assert!(adapter.cached("System", "all", &root).is_none());

    let request = Request::new("System", "POST").with_payload(json!({ "hostname": "edge-02" }));
    let response = adapter.invoke(&request);

    assert!(response.is_ok());
    assert_eq!(response.message, json!({ "hostname": "edge-02" }));
    assert_eq!(
        adapter.cached("System", "all", &root),
        Some(json!({ "hostname": "edge-01" }))
    );
}

// ── Events ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_subscribers_receive_updates() {
    let (_, adapter) = setup();
    let mut events = adapter.subscribe();
    let sda = path(&["sda"]);
    let target = StoreTarget::new("Disk", "health", &sda);

    adapter.store(json!({ "h": "OK" }), &target).unwrap();
    adapter.store(json!({ "h": "FAIL" }), &target).unwrap();

    let event = events.next().await.unwrap();
    assert_eq!(event.kind, EventKind::Updated);
    assert_eq!(event.key, CompositeKey::new("Disk", sda));
}
