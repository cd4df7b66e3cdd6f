use crate::application::aggregation::{AggregationView, DaySummary};
use crate::application::bootstrap::bootstrap_workspace;
use crate::application::plan_store::WeeklyPlanStore;
use crate::application::selection::SelectionState;
use crate::application::sync::{
    DomainSyncStatus, GenerateStatus, NowProvider, SyncOrchestrator, SyncOutcome,
};
use crate::application::timeline::TimelineEngine;
use crate::domain::dates::{format_date, parse_local_date, CalendarDate};
use crate::domain::models::{BlockStatus, DomainFailure, PlannerPolicy, SourceDomain, WeeklyPlan};
use crate::infrastructure::config::{CALENDAR_JSON, MEALS_JSON, TRAINING_JSON};
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::json_sources::{JsonCalendarSource, JsonMealSource, JsonTrainingSource};
use crate::infrastructure::plan_repository::{SqliteWeeklyPlanRepository, WeeklyPlanRepository};
use crate::infrastructure::sources::SourceSet;
use chrono::{Local, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info};

/// Everything the host application needs to drive the planner.
pub struct PlannerState<R = SqliteWeeklyPlanRepository>
where
    R: WeeklyPlanRepository,
{
    logs_dir: Option<PathBuf>,
    store: Arc<WeeklyPlanStore<R>>,
    aggregation: AggregationView<R>,
    orchestrator: SyncOrchestrator<R>,
    selection: Mutex<SelectionState>,
    log_guard: Mutex<()>,
}

impl PlannerState<SqliteWeeklyPlanRepository> {
    /// Bootstraps `workspace_root` and wires the file-backed sources and the
    /// SQLite plan repository.
    pub fn open(workspace_root: PathBuf) -> Result<Self, PlannerError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config_dir = &bootstrap.config_dir;
        let sources = SourceSet::new(
            Arc::new(JsonTrainingSource::new(config_dir.join(TRAINING_JSON))),
            Arc::new(JsonMealSource::new(config_dir.join(MEALS_JSON))),
            Arc::new(JsonCalendarSource::new(config_dir.join(CALENDAR_JSON))),
        );
        let repository = Arc::new(SqliteWeeklyPlanRepository::new(
            &bootstrap.database_path,
            bootstrap.user_id.clone(),
        ));
        Self::with_parts(
            sources,
            repository,
            bootstrap.policy,
            Some(bootstrap.logs_dir),
            Arc::new(|| Local::now().naive_local()),
        )
    }
}

impl<R> PlannerState<R>
where
    R: WeeklyPlanRepository,
{
    pub fn with_parts(
        sources: SourceSet,
        repository: Arc<R>,
        policy: PlannerPolicy,
        logs_dir: Option<PathBuf>,
        now_provider: NowProvider,
    ) -> Result<Self, PlannerError> {
        let today = now_provider().date();
        let store = Arc::new(WeeklyPlanStore::open(sources, repository, policy, today)?);
        let engine = Arc::new(TimelineEngine::new(Arc::clone(&store)));
        let aggregation = AggregationView::new(Arc::clone(&store), engine);
        let orchestrator =
            SyncOrchestrator::new(Arc::clone(&store)).with_now_provider(now_provider);

        let mut selection = SelectionState::new(today);
        selection.follow_week(store.week_start_date()?);

        Ok(Self {
            logs_dir,
            store,
            aggregation,
            orchestrator,
            selection: Mutex::new(selection),
            log_guard: Mutex::new(()),
        })
    }

    pub fn logs_dir(&self) -> Option<&Path> {
        self.logs_dir.as_deref()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        info!(command, "{message}");
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        error!(command, "{message}");
        self.append_log("error", command, message);
    }

    /// Writes a failed command to the command log before handing the error back.
    fn logged<T>(&self, command: &str, result: Result<T, PlannerError>) -> Result<T, PlannerError> {
        if let Err(error) = &result {
            self.log_error(command, &error.to_string());
        }
        result
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Some(logs_dir) = self.logs_dir.as_deref() else {
            return;
        };
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(logs_dir.join("commands.log"))
        {
            let _ = writeln!(file, "{payload}");
        }
    }

    fn weekly_plan_response(&self, plan: WeeklyPlan) -> WeeklyPlanResponse {
        let waking_minutes = self.store.policy().waking_minutes();
        WeeklyPlanResponse {
            week_start_date: plan.week_start_date,
            days: plan
                .days
                .into_iter()
                .map(|day| DaySummary::from_day(day, waking_minutes))
                .collect(),
        }
    }

    fn lock_selection(&self) -> Result<MutexGuard<'_, SelectionState>, PlannerError> {
        self.selection
            .lock()
            .map_err(|error| PlannerError::Storage(format!("selection lock poisoned: {error}")))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyPlanResponse {
    pub week_start_date: CalendarDate,
    pub days: Vec<DaySummary>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Applied,
    Dropped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub status: CommandStatus,
    pub plan: Option<WeeklyPlanResponse>,
    pub failures: Vec<DomainFailure>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResyncResponse {
    pub domain: SourceDomain,
    pub status: CommandStatus,
    pub plan: Option<WeeklyPlanResponse>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResponse {
    pub selected_date: CalendarDate,
    pub week_start_date: CalendarDate,
}

pub fn get_weekly_plan_impl<R>(state: &PlannerState<R>) -> Result<WeeklyPlanResponse, PlannerError>
where
    R: WeeklyPlanRepository,
{
    state.logged("get_weekly_plan", get_weekly_plan(state))
}

fn get_weekly_plan<R>(state: &PlannerState<R>) -> Result<WeeklyPlanResponse, PlannerError>
where
    R: WeeklyPlanRepository,
{
    let plan = state.store.weekly_plan()?;
    Ok(state.weekly_plan_response(plan))
}

pub async fn get_day_plan_impl<R>(
    state: &PlannerState<R>,
    date: String,
) -> Result<DaySummary, PlannerError>
where
    R: WeeklyPlanRepository,
{
    state.logged("get_day_plan", get_day_plan(state, date).await)
}

async fn get_day_plan<R>(
    state: &PlannerState<R>,
    date: String,
) -> Result<DaySummary, PlannerError>
where
    R: WeeklyPlanRepository,
{
    let date = parse_local_date(date.trim())?;
    state.aggregation.day_summary(date).await
}

/// `week_start` defaults to the current week.
pub async fn generate_impl<R>(
    state: &PlannerState<R>,
    week_start: Option<String>,
) -> Result<GenerateResponse, PlannerError>
where
    R: WeeklyPlanRepository,
{
    state.logged("generate", generate(state, week_start).await)
}

async fn generate<R>(
    state: &PlannerState<R>,
    week_start: Option<String>,
) -> Result<GenerateResponse, PlannerError>
where
    R: WeeklyPlanRepository,
{
    let requested = match week_start
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        Some(value) => parse_local_date(value)?,
        None => state.orchestrator.today(),
    };

    match state.orchestrator.generate(requested).await? {
        GenerateStatus::Applied(outcome) => {
            let week_start_date = outcome.plan.week_start_date;
            state.lock_selection()?.follow_week(week_start_date);
            let failed = outcome
                .failures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>();
            state.log_info(
                "generate",
                &format!(
                    "generated week_start={} failed_domains=[{}]",
                    format_date(week_start_date),
                    failed.join(", ")
                ),
            );
            Ok(GenerateResponse {
                status: CommandStatus::Applied,
                plan: Some(state.weekly_plan_response(outcome.plan)),
                failures: outcome.failures,
            })
        }
        GenerateStatus::Dropped => {
            state.log_info("generate", "dropped: sync already in progress");
            Ok(GenerateResponse {
                status: CommandStatus::Dropped,
                plan: None,
                failures: Vec::new(),
            })
        }
    }
}

pub async fn resync_domain_impl<R>(
    state: &PlannerState<R>,
    domain: String,
) -> Result<ResyncResponse, PlannerError>
where
    R: WeeklyPlanRepository,
{
    state.logged("resync_domain", resync_domain(state, domain).await)
}

async fn resync_domain<R>(
    state: &PlannerState<R>,
    domain: String,
) -> Result<ResyncResponse, PlannerError>
where
    R: WeeklyPlanRepository,
{
    let domain = domain
        .parse::<SourceDomain>()
        .map_err(PlannerError::InvalidConfig)?;

    let response = match state.orchestrator.resync(domain).await? {
        SyncOutcome::Applied(plan) => ResyncResponse {
            domain,
            status: CommandStatus::Applied,
            plan: Some(state.weekly_plan_response(plan)),
            error: None,
        },
        SyncOutcome::Dropped => ResyncResponse {
            domain,
            status: CommandStatus::Dropped,
            plan: None,
            error: None,
        },
        SyncOutcome::Failed(failure) => ResyncResponse {
            domain,
            status: CommandStatus::Failed,
            plan: Some(state.weekly_plan_response(state.store.weekly_plan()?)),
            error: Some(failure.message),
        },
    };
    state.log_info(
        "resync_domain",
        &format!("domain={domain} status={:?}", response.status),
    );
    Ok(response)
}

pub fn clear_impl<R>(state: &PlannerState<R>) -> Result<WeeklyPlanResponse, PlannerError>
where
    R: WeeklyPlanRepository,
{
    state.logged("clear", clear(state))
}

fn clear<R>(state: &PlannerState<R>) -> Result<WeeklyPlanResponse, PlannerError>
where
    R: WeeklyPlanRepository,
{
    let plan = state.store.clear()?;
    state.log_info("clear", &format!("cleared week_start={}", format_date(plan.week_start_date)));
    Ok(state.weekly_plan_response(plan))
}

pub fn clear_calendar_impl<R>(state: &PlannerState<R>) -> Result<WeeklyPlanResponse, PlannerError>
where
    R: WeeklyPlanRepository,
{
    state.logged("clear_calendar", clear_calendar(state))
}

fn clear_calendar<R>(state: &PlannerState<R>) -> Result<WeeklyPlanResponse, PlannerError>
where
    R: WeeklyPlanRepository,
{
    let plan = state.orchestrator.clear_calendar()?;
    state.log_info("clear_calendar", "cleared calendar blocks");
    Ok(state.weekly_plan_response(plan))
}

pub fn set_block_status_impl<R>(
    state: &PlannerState<R>,
    date: String,
    block_id: String,
    status: String,
) -> Result<bool, PlannerError>
where
    R: WeeklyPlanRepository,
{
    state.logged(
        "set_block_status",
        set_block_status(state, date, block_id, status),
    )
}

fn set_block_status<R>(
    state: &PlannerState<R>,
    date: String,
    block_id: String,
    status: String,
) -> Result<bool, PlannerError>
where
    R: WeeklyPlanRepository,
{
    let date = parse_local_date(date.trim())?;
    let block_id = required_block_id(&block_id)?;
    let status = status
        .parse::<BlockStatus>()
        .map_err(PlannerError::InvalidConfig)?;

    let updated = state.store.set_block_status(date, block_id, status)?;
    state.log_info(
        "set_block_status",
        &format!(
            "date={} block_id={block_id} status={status:?} updated={updated}",
            format_date(date)
        ),
    );
    Ok(updated)
}

pub fn reschedule_block_impl<R>(
    state: &PlannerState<R>,
    date: String,
    block_id: String,
    start_time: String,
    end_time: String,
) -> Result<bool, PlannerError>
where
    R: WeeklyPlanRepository,
{
    state.logged(
        "reschedule_block",
        reschedule_block(state, date, block_id, start_time, end_time),
    )
}

fn reschedule_block<R>(
    state: &PlannerState<R>,
    date: String,
    block_id: String,
    start_time: String,
    end_time: String,
) -> Result<bool, PlannerError>
where
    R: WeeklyPlanRepository,
{
    let date = parse_local_date(date.trim())?;
    let block_id = required_block_id(&block_id)?;

    let updated =
        state
            .store
            .reschedule_block(date, block_id, start_time.trim(), end_time.trim())?;
    state.log_info(
        "reschedule_block",
        &format!(
            "date={} block_id={block_id} start={} end={} updated={updated}",
            format_date(date),
            start_time.trim(),
            end_time.trim()
        ),
    );
    Ok(updated)
}

/// Marked dates of the month as "YYYY-MM-DD", ascending.
pub async fn month_index_impl<R>(
    state: &PlannerState<R>,
    year: i32,
    month: u32,
) -> Result<Vec<String>, PlannerError>
where
    R: WeeklyPlanRepository,
{
    state.logged("month_index", month_index(state, year, month).await)
}

async fn month_index<R>(
    state: &PlannerState<R>,
    year: i32,
    month: u32,
) -> Result<Vec<String>, PlannerError>
where
    R: WeeklyPlanRepository,
{
    let index = state.aggregation.month_index(year, month).await?;
    Ok(index.into_iter().map(format_date).collect())
}

pub fn sync_statuses_impl<R>(state: &PlannerState<R>) -> Vec<DomainSyncStatus>
where
    R: WeeklyPlanRepository,
{
    state.orchestrator.sync_statuses()
}

pub fn select_date_impl<R>(
    state: &PlannerState<R>,
    date: String,
) -> Result<SelectionResponse, PlannerError>
where
    R: WeeklyPlanRepository,
{
    state.logged("select_date", select_date(state, date))
}

fn select_date<R>(
    state: &PlannerState<R>,
    date: String,
) -> Result<SelectionResponse, PlannerError>
where
    R: WeeklyPlanRepository,
{
    let date = parse_local_date(date.trim())?;
    let week_start_date = state.store.week_start_date()?;
    let selected_date = state.lock_selection()?.select(week_start_date, date);
    Ok(SelectionResponse {
        selected_date,
        week_start_date,
    })
}

pub fn jump_to_today_impl<R>(state: &PlannerState<R>) -> Result<SelectionResponse, PlannerError>
where
    R: WeeklyPlanRepository,
{
    state.logged("jump_to_today", jump_to_today(state))
}

fn jump_to_today<R>(state: &PlannerState<R>) -> Result<SelectionResponse, PlannerError>
where
    R: WeeklyPlanRepository,
{
    let mut selection = state.lock_selection()?;
    let selected_date = state.orchestrator.jump_to_today(&mut selection)?;
    Ok(SelectionResponse {
        selected_date,
        week_start_date: state.store.week_start_date()?,
    })
}

fn required_block_id(block_id: &str) -> Result<&str, PlannerError> {
    let block_id = block_id.trim();
    if block_id.is_empty() {
        return Err(PlannerError::InvalidConfig(
            "block_id must not be empty".to_string(),
        ));
    }
    Ok(block_id)
}
