use crate::application::normalizer::{
    collect_blocks, normalize_calendar_event, normalize_meal, normalize_workout, sleep_block,
    MealWeek, TrainingWeek, MEAL_DISPLAY_MINUTES,
};
use crate::domain::dates::{
    format_date, parse_hhmm, span_minutes, week_dates, week_start, CalendarDate, DayOfWeek,
};
use crate::domain::models::{
    BlockKind, BlockStatus, DomainFailure, PlannerPolicy, SourceDomain, TimeBlock, WeeklyPlan,
};
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::plan_repository::WeeklyPlanRepository;
use crate::infrastructure::sources::{CalendarEvent, SourceSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const CALENDAR_FETCH_CONCURRENCY: usize = 4;

/// Per-day blocks for one domain, Sunday first.
pub type DomainBlocks = Vec<Vec<TimeBlock>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOutcome {
    pub plan: WeeklyPlan,
    pub failures: Vec<DomainFailure>,
}

/// Owner of the active week. Every mutation is applied to a copy, written
/// through the repository, and only then made visible.
pub struct WeeklyPlanStore<R>
where
    R: WeeklyPlanRepository,
{
    sources: SourceSet,
    repository: Arc<R>,
    policy: PlannerPolicy,
    plan: Mutex<WeeklyPlan>,
    training_lock: AsyncMutex<()>,
    meals_lock: AsyncMutex<()>,
    calendar_lock: AsyncMutex<()>,
}

impl<R> WeeklyPlanStore<R>
where
    R: WeeklyPlanRepository,
{
    /// Loads the persisted week, or starts an empty one on the week of `today`.
    pub fn open(
        sources: SourceSet,
        repository: Arc<R>,
        policy: PlannerPolicy,
        today: CalendarDate,
    ) -> Result<Self, PlannerError> {
        let plan = match repository.load()? {
            Some(plan) => plan,
            None => WeeklyPlan::empty(week_start(today)),
        };
        debug!(week_start = %format_date(plan.week_start_date), "opened weekly plan store");
        Ok(Self {
            sources,
            repository,
            policy,
            plan: Mutex::new(plan),
            training_lock: AsyncMutex::new(()),
            meals_lock: AsyncMutex::new(()),
            calendar_lock: AsyncMutex::new(()),
        })
    }

    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    pub fn policy(&self) -> &PlannerPolicy {
        &self.policy
    }

    pub fn weekly_plan(&self) -> Result<WeeklyPlan, PlannerError> {
        Ok(self.lock_plan()?.clone())
    }

    pub fn week_start_date(&self) -> Result<CalendarDate, PlannerError> {
        Ok(self.lock_plan()?.week_start_date)
    }

    /// Rebuilds the whole week from all three sources. A domain that fails
    /// keeps its stored blocks when the week is unchanged and is left empty
    /// otherwise; the call fails only when every domain fails.
    pub async fn generate(&self, requested: CalendarDate) -> Result<GenerateOutcome, PlannerError> {
        let week_start_date = week_start(requested);
        let _training = self.training_lock.lock().await;
        let _meals = self.meals_lock.lock().await;
        let _calendar = self.calendar_lock.lock().await;

        let (training, meals, calendar) = tokio::join!(
            self.fetch_domain(SourceDomain::Training, week_start_date),
            self.fetch_domain(SourceDomain::Meals, week_start_date),
            self.fetch_domain(SourceDomain::Calendar, week_start_date),
        );
        let results = [
            (SourceDomain::Training, training),
            (SourceDomain::Meals, meals),
            (SourceDomain::Calendar, calendar),
        ];

        let failures = results
            .iter()
            .filter_map(|(domain, result)| {
                result
                    .as_ref()
                    .err()
                    .map(|error| error.domain_failure(*domain))
            })
            .collect::<Vec<_>>();
        if failures.len() == results.len() {
            return Err(PlannerError::AllSourcesFailed(failures));
        }

        let plan = self
            .update(|current| {
                let same_week = current.week_start_date == week_start_date;
                let mut next = WeeklyPlan::empty(week_start_date);
                for (domain, result) in results {
                    match result {
                        Ok(blocks) => next.restore_domain(domain, blocks),
                        Err(error) => {
                            warn!(domain = %domain, %error, same_week, "generate kept stale blocks for failed domain");
                            if same_week {
                                next.restore_domain(domain, current.domain_blocks(domain));
                            }
                        }
                    }
                }
                if self.policy.include_sleep_blocks {
                    for day in &mut next.days {
                        if let Some(block) = sleep_block(day.date, &self.policy) {
                            day.blocks.push(block);
                            day.sort_blocks();
                        }
                    }
                }
                *current = next;
                true
            })?
            .unwrap_or_else(|| WeeklyPlan::empty(week_start_date));

        info!(
            week_start = %format_date(week_start_date),
            failed_domains = failures.len(),
            "generated weekly plan"
        );
        Ok(GenerateOutcome { plan, failures })
    }

    /// Re-derives one domain for the active week. Two calls for the same
    /// domain run one after the other; different domains run side by side.
    pub async fn resync_domain(&self, domain: SourceDomain) -> Result<WeeklyPlan, PlannerError> {
        let _serial = self.domain_lock(domain).lock().await;
        let week_start_date = self.week_start_date()?;
        let incoming = self.fetch_domain(domain, week_start_date).await?;

        let plan = self
            .update(|current| {
                current.merge_domain(domain, incoming);
                true
            })?
            .unwrap_or_else(|| WeeklyPlan::empty(week_start_date));
        info!(domain = %domain, week_start = %format_date(week_start_date), "resynced domain");
        Ok(plan)
    }

    /// Returns `false` when the date is outside the active week or the block
    /// does not exist.
    pub fn set_block_status(
        &self,
        date: CalendarDate,
        block_id: &str,
        status: BlockStatus,
    ) -> Result<bool, PlannerError> {
        let updated = self.update(|plan| {
            match plan.day_mut(date).and_then(|day| day.block_mut(block_id)) {
                Some(block) => {
                    block.status = status;
                    true
                }
                None => false,
            }
        })?;
        if updated.is_none() {
            info!(date = %format_date(date), block_id, "set_block_status ignored unknown block");
        }
        Ok(updated.is_some())
    }

    /// Moves a stored, timed block to a new window and re-sorts its day.
    /// Meal blocks keep their fixed display duration.
    pub fn reschedule_block(
        &self,
        date: CalendarDate,
        block_id: &str,
        start_time: &str,
        end_time: &str,
    ) -> Result<bool, PlannerError> {
        let start = parse_hhmm(start_time)
            .ok_or_else(|| PlannerError::MalformedTime(start_time.to_string()))?;
        let end =
            parse_hhmm(end_time).ok_or_else(|| PlannerError::MalformedTime(end_time.to_string()))?;

        let updated = self.update(|plan| {
            let Some(day) = plan.day_mut(date) else {
                return false;
            };
            let Some(block) = day.block_mut(block_id).filter(|block| !block.is_all_day) else {
                return false;
            };
            block.start_time = start_time.to_string();
            block.end_time = end_time.to_string();
            block.duration = match block.kind {
                BlockKind::MealEating | BlockKind::MealPrep => MEAL_DISPLAY_MINUTES,
                _ => span_minutes(start, end),
            };
            day.sort_blocks();
            true
        })?;
        if updated.is_none() {
            info!(date = %format_date(date), block_id, "reschedule_block ignored unknown or all-day block");
        }
        Ok(updated.is_some())
    }

    /// Empties all seven days and keeps the week start.
    pub fn clear(&self) -> Result<WeeklyPlan, PlannerError> {
        let plan = self.update(|plan| {
            plan.clear();
            true
        })?;
        info!("cleared weekly plan");
        plan.map_or_else(|| self.weekly_plan(), Ok)
    }

    pub fn clear_domain(&self, domain: SourceDomain) -> Result<WeeklyPlan, PlannerError> {
        let plan = self.update(|plan| {
            plan.clear_domain(domain);
            true
        })?;
        info!(domain = %domain, "cleared domain blocks");
        plan.map_or_else(|| self.weekly_plan(), Ok)
    }

    /// Derives `domain`'s blocks for the week starting at `week_start_date`
    /// without touching the store.
    pub async fn fetch_domain(
        &self,
        domain: SourceDomain,
        week_start_date: CalendarDate,
    ) -> Result<DomainBlocks, PlannerError> {
        let dates = week_dates(week_start_date);
        let blocks = match domain {
            SourceDomain::Training => {
                let schedule = self.sources.training.get_weekly_schedule().await;
                let week = TrainingWeek::from_schedule(
                    schedule.map_err(|error| PlannerError::source(domain, error))?,
                );
                dates
                    .iter()
                    .map(|date| {
                        let entry = week.day(DayOfWeek::from_date(*date));
                        collect_blocks(*date, normalize_workout(*date, entry))
                    })
                    .collect()
            }
            SourceDomain::Meals => {
                let plan = self.sources.meals.get_weekly_plan().await;
                let week =
                    MealWeek::from_plan(plan.map_err(|error| PlannerError::source(domain, error))?);
                dates
                    .iter()
                    .map(|date| {
                        let meals = week.meals(DayOfWeek::from_date(*date));
                        collect_blocks(*date, meals.iter().map(|meal| normalize_meal(*date, meal)))
                    })
                    .collect()
            }
            SourceDomain::Calendar => {
                let events = self
                    .fetch_calendar_week(dates)
                    .await
                    .map_err(|error| PlannerError::source(domain, error))?;
                dates
                    .iter()
                    .zip(events)
                    .map(|(date, events)| {
                        collect_blocks(
                            *date,
                            events
                                .iter()
                                .map(|event| normalize_calendar_event(*date, event)),
                        )
                    })
                    .collect()
            }
        };
        Ok(blocks)
    }

    async fn fetch_calendar_week(
        &self,
        dates: [CalendarDate; 7],
    ) -> Result<Vec<Vec<CalendarEvent>>, PlannerError> {
        let calendar = &self.sources.calendar;
        if let Some(mut range) = calendar.events_in_range(dates[0], dates[6]).await? {
            return Ok(dates
                .iter()
                .map(|date| range.remove(date).unwrap_or_default())
                .collect());
        }

        let mut fetches: JoinSet<Result<(usize, Vec<CalendarEvent>), PlannerError>> =
            JoinSet::new();
        let mut events = vec![Vec::new(); dates.len()];
        for (index, date) in dates.into_iter().enumerate() {
            let calendar = Arc::clone(calendar);
            fetches.spawn(async move {
                let events = calendar.get_events_for_date(date).await?;
                Ok((index, events))
            });
            if fetches.len() >= CALENDAR_FETCH_CONCURRENCY {
                collect_day_events(&mut fetches, &mut events).await?;
            }
        }
        while !fetches.is_empty() {
            collect_day_events(&mut fetches, &mut events).await?;
        }
        Ok(events)
    }

    fn domain_lock(&self, domain: SourceDomain) -> &AsyncMutex<()> {
        match domain {
            SourceDomain::Training => &self.training_lock,
            SourceDomain::Meals => &self.meals_lock,
            SourceDomain::Calendar => &self.calendar_lock,
        }
    }

    fn lock_plan(&self) -> Result<MutexGuard<'_, WeeklyPlan>, PlannerError> {
        self.plan
            .lock()
            .map_err(|error| PlannerError::Storage(format!("weekly plan lock poisoned: {error}")))
    }

    /// Applies `apply` to a copy of the plan and commits it when it reports a
    /// change. Returns the committed plan, or `None` when nothing changed.
    fn update<F>(&self, apply: F) -> Result<Option<WeeklyPlan>, PlannerError>
    where
        F: FnOnce(&mut WeeklyPlan) -> bool,
    {
        let mut current = self.lock_plan()?;
        let mut next = current.clone();
        if !apply(&mut next) {
            return Ok(None);
        }
        self.repository.save(&next)?;
        debug!(week_start = %format_date(next.week_start_date), "persisted weekly plan");
        *current = next.clone();
        Ok(Some(next))
    }
}

async fn collect_day_events(
    fetches: &mut JoinSet<Result<(usize, Vec<CalendarEvent>), PlannerError>>,
    events: &mut [Vec<CalendarEvent>],
) -> Result<(), PlannerError> {
    let Some(join_result) = fetches.join_next().await else {
        return Ok(());
    };
    let (index, day_events) = join_result.map_err(|error| {
        PlannerError::Storage(format!("failed to join calendar fetch task: {error}"))
    })??;
    if let Some(slot) = events.get_mut(index) {
        *slot = day_events;
    }
    Ok(())
}
