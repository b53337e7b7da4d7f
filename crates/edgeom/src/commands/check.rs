//! Configuration check: settings, descriptor tables, timers, action keys.

use serde::Serialize;
use tabled::Tabled;

use edgeom_config::Config;
use edgeom_core::{ClassRegistry, RefreshTimer};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

/// Reason a disabled timer reports; switched-off timers are not problems.
const DISABLED: &str = "Timer is disabled.";

#[derive(Debug, Serialize, PartialEq, Eq)]
struct Problem {
    model: String,
    issue: String,
}

impl Problem {
    fn new(model: &str, issue: impl Into<String>) -> Self {
        Self {
            model: model.to_owned(),
            issue: issue.into(),
        }
    }
}

#[derive(Tabled)]
struct ProblemRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Problem")]
    issue: String,
}

#[derive(Debug, Serialize)]
struct Summary {
    models: usize,
    cached_models: usize,
    timers: usize,
    problems: Vec<Problem>,
}

// ── Checks ──────────────────────────────────────────────────────────

fn check_settings(settings: &Config) -> Vec<Problem> {
    match edgeom_config::adapter_config(settings) {
        Ok(_) => Vec::new(),
        Err(e) => vec![Problem::new("(settings)", e.to_string())],
    }
}

fn check_references(registry: &ClassRegistry) -> Vec<Problem> {
    let mut problems = Vec::new();
    for (model, descriptor) in registry.iter() {
        if descriptor.implementation.trim().is_empty() {
            problems.push(Problem::new(model, "class locator is empty"));
        }
        if let Some(parent) = descriptor.timer.as_ref().and_then(|t| t.parent.as_deref()) {
            if registry.timer_entry(parent).is_none() {
                problems.push(Problem::new(
                    model,
                    format!("timer parent {parent} has no timer entry"),
                ));
            }
        }
        for (key, action) in &descriptor.action {
            if let Some(params) = &action.params {
                let parts: Vec<&str> = params.split(',').map(str::trim).collect();
                if parts.len() < 2 || parts.iter().any(|p| p.is_empty()) {
                    problems.push(Problem::new(
                        model,
                        format!("{key}: params '{params}' is not <Model>,<subKey>"),
                    ));
                }
            }
            let referenced = action
                .parent_resource_path
                .iter()
                .cloned()
                .chain(action.child_models());
            for other in referenced {
                if !registry.contains(&other) {
                    problems.push(Problem::new(
                        model,
                        format!("{key}: references unknown model {other}"),
                    ));
                }
            }
        }
    }
    problems
}

fn check_timers(timers: &[RefreshTimer]) -> Vec<Problem> {
    let mut problems = Vec::new();
    for timer in timers {
        match timer.validate() {
            Ok(()) => {}
            Err(reason) if reason == DISABLED => {
                tracing::info!(model = %timer.model, "timer disabled");
            }
            Err(reason) => problems.push(Problem::new(&timer.model, format!("timer: {reason}"))),
        }
        for key in &timer.rejected_actions {
            problems.push(Problem::new(
                &timer.model,
                format!("action key '{key}' is not <Module>_<funcKey>"),
            ));
        }
    }
    problems
}

fn summarize(settings: &Config, registry: &ClassRegistry) -> Summary {
    let timers = RefreshTimer::from_registry(registry);
    let mut problems = check_settings(settings);
    problems.extend(check_references(registry));
    problems.extend(check_timers(&timers));
    Summary {
        models: registry.len(),
        cached_models: registry.lockable_models().len(),
        timers: timers.len(),
        problems,
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let (settings, registry) = config::load_registry(global)?;
    let summary = summarize(&settings, &registry);

    let out = output::render_single(global.output, &summary, |s| {
        let color = output::should_color(global.color);
        let headline = format!(
            "{} models ({} cached), {} timers: {}",
            s.models,
            s.cached_models,
            s.timers,
            output::verdict(
                (!s.problems.is_empty()).then_some("problems found"),
                color
            )
        );
        if s.problems.is_empty() {
            return headline;
        }
        let rows = s.problems.iter().map(|p| ProblemRow {
            model: p.model.clone(),
            issue: p.issue.clone(),
        });
        let table = tabled::Table::new(rows)
            .with(tabled::settings::Style::rounded())
            .to_string();
        format!("{table}\n{headline}")
    })?;
    output::print_output(&out, global.quiet)?;

    if summary.problems.is_empty() {
        Ok(())
    } else {
        Err(CliError::CheckFailed {
            problems: summary.problems.len(),
        })
    }
}
