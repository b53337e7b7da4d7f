// ── Periodic refresher ──
//
// Drives the fetch/store path for models that declare a refresh timer.
// Each timer runs one pass over its actions immediately (unless
// delayed), then once per interval until its run budget is spent or
// the refresher is cancelled. Passes run on the blocking pool since
// handler calls are synchronous and may be slow.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::adapter::{Adapter, FetchRequest};
use crate::error::CoreError;
use crate::model::{ModelDescriptor, ResourcePath, Status, TimerSettings, segment_id, split_action_key};
use crate::registry::ClassRegistry;

/// Largest cycle hint before it wraps back to 1.
pub const MAX_CYCLE: u32 = 1000;

/// Module of an action that ends the pass it is reached in.
pub const LOCAL_MODULE: &str = "local";

// ── Timer definitions ───────────────────────────────────────────────

/// One refresh action: fetch `func_key` of `module`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerAction {
    pub key: String,
    pub module: String,
    pub func_key: String,
    pub has_list: bool,
    pub params: Option<String>,
    pub parent: Option<String>,
    pub children: Vec<String>,
}

/// A model's refresh schedule plus its actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTimer {
    pub model: String,
    pub settings: TimerSettings,
    pub is_local: bool,
    pub actions: Vec<TimerAction>,
    /// Action keys that are not of the form `<Module>_<funcKey>`.
    pub rejected_actions: Vec<String>,
}

impl RefreshTimer {
    /// Timer of one descriptor, if it declares a schedule and actions.
    /// The schedule is taken as written; see [`Self::from_registry`] for
    /// parent inheritance.
    pub fn from_descriptor(model: &str, descriptor: &ModelDescriptor) -> Option<Self> {
        let settings = descriptor.timer.as_ref()?.resolve(None);
        Self::with_settings(model, descriptor, settings)
    }

    fn with_settings(
        model: &str,
        descriptor: &ModelDescriptor,
        settings: TimerSettings,
    ) -> Option<Self> {
        if descriptor.action.is_empty() {
            return None;
        }

        let mut actions = Vec::new();
        let mut rejected_actions = Vec::new();
        for (key, action) in &descriptor.action {
            let Some((module, func_key)) = split_action_key(key) else {
                error!(model, action = %key, "action key is not <Module>_<funcKey>");
                rejected_actions.push(key.clone());
                continue;
            };
            actions.push(TimerAction {
                key: key.clone(),
                module: module.to_owned(),
                func_key: func_key.to_owned(),
                has_list: action.has_list,
                params: action.params.clone(),
                parent: action.parent_resource_path.clone(),
                children: action.child_models(),
            });
        }

        Some(Self {
            model: model.to_owned(),
            settings,
            is_local: descriptor.is_local,
            actions,
            rejected_actions,
        })
    }

    /// Every timer declared in `registry`, in model order, with unset
    /// settings inherited from the timer's parent entry.
    pub fn from_registry(registry: &ClassRegistry) -> Vec<Self> {
        registry
            .iter()
            .filter_map(|(model, descriptor)| {
                let settings = registry.timer_settings(model)?;
                Self::with_settings(model, descriptor, settings)
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), String> {
        self.settings.validate()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.settings.interval_time)
    }

    /// Run every action once, in order. Reaching a `local` action ends
    /// the pass.
    pub fn run_pass(&self, adapter: &Adapter, cycle: u32, cancel: &CancellationToken) {
        for action in &self.actions {
            if cancel.is_cancelled() {
                return;
            }
            if action.module == LOCAL_MODULE {
                debug!(model = %self.model, action = %action.key, "local action ends the pass");
                return;
            }
            let Some(params) = &action.params else {
                self.run_action(adapter, action, &ResourcePath::root(), cycle, cancel);
                continue;
            };

            let Some(Value::Array(items)) = adapter.resource_value(params) else {
                debug!(model = %self.model, params = %params, "no cached list for action parameters");
                continue;
            };
            for item in &items {
                if cancel.is_cancelled() {
                    return;
                }
                match ResourcePath::new([segment_id(item)]) {
                    Ok(path) => self.run_action(adapter, action, &path, cycle, cancel),
                    Err(e) => warn!(model = %self.model, error = %e, "bad action parameter"),
                }
            }
        }
    }

    fn run_action(
        &self,
        adapter: &Adapter,
        action: &TimerAction,
        path: &ResourcePath,
        cycle: u32,
        cancel: &CancellationToken,
    ) {
        let base = FetchRequest::new(action.module.as_str(), action.func_key.as_str())
            .at(path.clone())
            .cycle(cycle)
            .parent(action.parent.clone())
            .children(action.children.clone());

        if !action.has_list {
            let result = self.fetch_item(adapter, base);
            self.report(action, path, result);
            return;
        }

        let items = match adapter.refresh(base.clone().list(true)) {
            Ok(Value::Array(items)) => items,
            Ok(other) => {
                error!(model = %self.model, action = %action.key, value = %other, "list refresh returned a non-list");
                return;
            }
            Err(e) => {
                error!(model = %self.model, action = %action.key, error = %e, "list refresh failed");
                return;
            }
        };

        let pause = adapter.config().refresh_item_pause;
        for item in &items {
            if cancel.is_cancelled() {
                return;
            }
            let Some(item_path) = path.child(segment_id(item)) else {
                error!(model = %self.model, action = %action.key, "list items exceed the path depth");
                return;
            };
            if !pause.is_zero() {
                std::thread::sleep(pause);
            }
            let result = self.fetch_item(adapter, base.clone().at(item_path.clone()));
            self.report(action, &item_path, result);
        }
    }

    fn fetch_item(&self, adapter: &Adapter, request: FetchRequest) -> Result<Value, CoreError> {
        if self.is_local {
            adapter.fetch(&request.cached(false))
        } else {
            adapter.refresh(request)
        }
    }

    fn report(&self, action: &TimerAction, path: &ResourcePath, result: Result<Value, CoreError>) {
        if let Err(e) = result {
            if e.status() != Status::NOT_EXIST {
                error!(
                    model = %self.model,
                    action = %action.key,
                    path = %path,
                    error = %e,
                    "refresh failed"
                );
            }
        }
    }
}

// ── Run budget ──────────────────────────────────────────────────────

/// Remaining run budget and cycle counter of one timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerState {
    remaining: i64,
    cycle: u32,
}

impl TimerState {
    /// `run_times == 0` runs forever.
    pub fn new(run_times: i64) -> Self {
        Self {
            remaining: run_times,
            cycle: 1,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.remaining < 0
    }

    /// Account for one pass and return its cycle hint.
    pub fn begin_run(&mut self) -> u32 {
        let cycle = self.cycle;
        match self.remaining {
            0 => {}
            1 => self.remaining = -1,
            n => self.remaining = n - 1,
        }
        self.cycle = if self.cycle % MAX_CYCLE == 0 { 1 } else { self.cycle + 1 };
        cycle
    }
}

// ── Scheduler ───────────────────────────────────────────────────────

/// Handle to the running refresh timers.
pub struct Refresher {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Refresher {
    /// Validate the timers of the adapter's registry, run the initial
    /// pass of every non-delayed timer and wait for all of them, then
    /// schedule the periodic passes.
    pub async fn start(adapter: Adapter) -> Self {
        let cancel = CancellationToken::new();
        let mut initial = JoinSet::new();
        let mut scheduled = Vec::new();

        for timer in RefreshTimer::from_registry(adapter.registry()) {
            if let Err(reason) = timer.validate() {
                warn!(model = %timer.model, reason = %reason, "refresh timer not started");
                continue;
            }
            let timer = Arc::new(timer);
            let mut state = TimerState::new(timer.settings.run_times);

            if timer.settings.delay {
                info!(model = %timer.model, "refresh timer delayed to its first interval");
                scheduled.push((timer, state));
                continue;
            }

            let adapter = adapter.clone();
            let cancel = cancel.clone();
            initial.spawn_blocking(move || {
                let cycle = state.begin_run();
                timer.run_pass(&adapter, cycle, &cancel);
                (timer, state)
            });
        }

        while let Some(joined) = initial.join_next().await {
            match joined {
                Ok(entry) => scheduled.push(entry),
                Err(e) => error!(error = %e, "initial refresh pass aborted"),
            }
        }
        info!(timers = scheduled.len(), "all refresh timers initialised");

        let handles = scheduled
            .into_iter()
            .map(|(timer, state)| {
                tokio::spawn(timer_task(adapter.clone(), timer, state, cancel.clone()))
            })
            .collect();

        Self { cancel, handles }
    }

    /// Number of timer tasks still running.
    pub fn active(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Cancel every timer and wait for in-flight passes to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "refresh timer task failed");
            }
        }
    }
}

async fn timer_task(
    adapter: Adapter,
    timer: Arc<RefreshTimer>,
    mut state: TimerState,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(timer.interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    while !state.exhausted() {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let cycle = state.begin_run();
                let adapter = adapter.clone();
                let pass_timer = Arc::clone(&timer);
                let pass_cancel = cancel.clone();
                let pass = tokio::task::spawn_blocking(move || {
                    pass_timer.run_pass(&adapter, cycle, &pass_cancel);
                });
                if let Err(e) = pass.await {
                    error!(model = %timer.model, error = %e, "refresh pass aborted");
                }
            }
        }
    }
    debug!(model = %timer.model, "refresh timer stopped");
}
