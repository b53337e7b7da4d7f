//! Model listing and detail views.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use serde::Serialize;
use tabled::Tabled;

use edgeom_core::{ClassRegistry, ModelDescriptor, TimerSettings};

use crate::cli::{GlobalOpts, ModelsArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Views ───────────────────────────────────────────────────────────

/// One model as listed.
#[derive(Debug, Serialize)]
struct ModelEntry<'a> {
    name: &'a str,
    class: &'a str,
    keys: &'a [String],
    local: bool,
    cached: bool,
    actions: Vec<&'a str>,
    timer: bool,
}

impl<'a> ModelEntry<'a> {
    fn new(name: &'a str, descriptor: &'a ModelDescriptor, cached: &BTreeSet<String>) -> Self {
        Self {
            name,
            class: &descriptor.implementation,
            keys: &descriptor.keys,
            local: descriptor.is_local,
            cached: cached.contains(name),
            actions: descriptor.action.keys().map(String::as_str).collect(),
            timer: descriptor.timer.is_some(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ModelDetail<'a> {
    name: &'a str,
    cached: bool,
    /// Timer settings after parent inheritance.
    #[serde(skip_serializing_if = "Option::is_none")]
    schedule: Option<TimerSettings>,
    #[serde(flatten)]
    descriptor: &'a ModelDescriptor,
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Model")]
    name: String,
    #[tabled(rename = "Class")]
    class: String,
    #[tabled(rename = "Keys")]
    keys: String,
    #[tabled(rename = "Local")]
    local: String,
    #[tabled(rename = "Cached")]
    cached: String,
    #[tabled(rename = "Actions")]
    actions: usize,
}

impl From<&ModelEntry<'_>> for ModelRow {
    fn from(m: &ModelEntry<'_>) -> Self {
        Self {
            name: m.name.to_owned(),
            class: m.class.to_owned(),
            keys: m.keys.join(", "),
            local: yes_no(m.local),
            cached: yes_no(m.cached),
            actions: m.actions.len(),
        }
    }
}

fn yes_no(flag: bool) -> String {
    if flag { "yes" } else { "no" }.into()
}

fn detail(m: &ModelDetail<'_>) -> String {
    let d = m.descriptor;
    let mut out = String::new();
    let _ = writeln!(out, "Model:   {}", m.name);
    let _ = writeln!(out, "Class:   {}", d.implementation);
    let _ = writeln!(out, "Keys:    {}", d.keys.join(", "));
    let _ = writeln!(out, "Local:   {}", yes_no(d.is_local));
    let _ = writeln!(out, "Cached:  {}", yes_no(m.cached));
    if let Some(timer) = &m.schedule {
        let _ = write!(
            out,
            "Timer:   every {}s, runs {}",
            timer.interval_time, timer.run_times
        );
        if let Some(parent) = d.timer.as_ref().and_then(|t| t.parent.as_deref()) {
            let _ = write!(out, " (inherits {parent})");
        }
        out.push('\n');
    }
    for (key, action) in &d.action {
        let _ = write!(out, "Action:  {key}");
        if action.has_list {
            out.push_str(" (list)");
        }
        if let Some(parent) = &action.parent_resource_path {
            let _ = write!(out, " -> {parent}");
        }
        out.push('\n');
    }
    out.trim_end().to_owned()
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: &ModelsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (_, registry) = config::load_registry(global)?;
    let out = render(&registry, args.name.as_deref(), global)?;
    output::print_output(&out, global.quiet)
}

fn render(
    registry: &ClassRegistry,
    name: Option<&str>,
    global: &GlobalOpts,
) -> Result<String, CliError> {
    let cached = registry.lockable_models();

    if let Some(name) = name {
        let descriptor = registry.lookup(name)?;
        let view = ModelDetail {
            name,
            cached: cached.contains(name),
            schedule: registry.timer_settings(name),
            descriptor,
        };
        return output::render_single(global.output, &view, detail);
    }

    let entries: Vec<ModelEntry<'_>> = registry
        .iter()
        .map(|(name, descriptor)| ModelEntry::new(name, descriptor, &cached))
        .collect();
    output::render_list(global.output, &entries, |m| ModelRow::from(m))
}
