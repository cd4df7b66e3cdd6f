pub mod application;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
mod test_utils;

pub use application::aggregation::{AggregationView, DaySummary};
pub use application::commands::{
    clear_calendar_impl, clear_impl, generate_impl, get_day_plan_impl, get_weekly_plan_impl,
    jump_to_today_impl, month_index_impl, reschedule_block_impl, resync_domain_impl,
    select_date_impl, set_block_status_impl, sync_statuses_impl, CommandStatus,
    GenerateResponse, PlannerState, ResyncResponse, SelectionResponse, WeeklyPlanResponse,
};
pub use application::plan_store::{GenerateOutcome, WeeklyPlanStore};
pub use application::selection::SelectionState;
pub use application::sync::{
    DomainSyncStatus, GenerateStatus, SyncOrchestrator, SyncOutcome, SyncPhase,
};
pub use application::timeline::TimelineEngine;
pub use domain::dates::{format_date, parse_local_date, CalendarDate, DayOfWeek};
pub use domain::models::{
    BlockKind, BlockStatus, DayPlan, DomainFailure, PlannerPolicy, SourceDomain, TimeBlock,
    WeeklyPlan,
};
pub use infrastructure::error::PlannerError;
pub use infrastructure::plan_repository::{
    InMemoryWeeklyPlanRepository, SqliteWeeklyPlanRepository, WeeklyPlanRepository,
};
pub use infrastructure::sources::{CalendarSource, MealSource, SourceSet, TrainingSource};

use std::env;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber. The filter comes from `PLANNER_LOG`
/// and `PLANNER_LOG_FORMAT=json` switches to JSON lines. Calling it again
/// once a subscriber is set is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("PLANNER_LOG")
        .unwrap_or_else(|_| EnvFilter::new("timeline_planner=info,warn"));
    let format = env::var("PLANNER_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);
    let _ = match format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_ansi(false))
            .try_init(),
        _ => registry.with(fmt::layer().compact()).try_init(),
    };
}
