//! Refresh timer listing.

use serde::Serialize;
use tabled::Tabled;

use edgeom_core::RefreshTimer;

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
pub(super) struct TimerView {
    pub model: String,
    pub interval_secs: u64,
    pub run_times: i64,
    pub delay: bool,
    pub actions: usize,
    pub rejected_actions: Vec<String>,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&RefreshTimer> for TimerView {
    fn from(timer: &RefreshTimer) -> Self {
        let reason = timer.validate().err();
        Self {
            model: timer.model.clone(),
            interval_secs: timer.settings.interval_time,
            run_times: timer.settings.run_times,
            delay: timer.settings.delay,
            actions: timer.actions.len(),
            rejected_actions: timer.rejected_actions.clone(),
            valid: reason.is_none(),
            reason,
        }
    }
}

#[derive(Tabled)]
struct TimerRow {
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Interval")]
    interval: String,
    #[tabled(rename = "Runs")]
    runs: String,
    #[tabled(rename = "Actions")]
    actions: usize,
    #[tabled(rename = "Status")]
    status: String,
}

fn row(t: &TimerView, color: bool) -> TimerRow {
    TimerRow {
        model: t.model.clone(),
        interval: format!("{}s", t.interval_secs),
        runs: match t.run_times {
            0 => "forever".into(),
            n => n.to_string(),
        },
        actions: t.actions,
        status: output::verdict(t.reason.as_deref(), color),
    }
}

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let (_, registry) = config::load_registry(global)?;
    let entries: Vec<TimerView> = RefreshTimer::from_registry(&registry)
        .iter()
        .map(TimerView::from)
        .collect();

    let color = output::should_color(global.color);
    let out = output::render_list(global.output, &entries, |t| row(t, color))?;
    output::print_output(&out, global.quiet)
}
