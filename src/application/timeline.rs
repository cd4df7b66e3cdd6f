//! Day-level reads over the active week, with live derivation for every
//! other date.

use crate::application::normalizer::{
    collect_blocks, normalize_calendar_event, normalize_meal, normalize_workout, sleep_block,
    MealWeek, Normalized, TrainingWeek,
};
use crate::application::plan_store::WeeklyPlanStore;
use crate::domain::dates::{format_date, CalendarDate, DayOfWeek};
use crate::domain::models::{DayPlan, SourceDomain};
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::plan_repository::WeeklyPlanRepository;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct TimelineEngine<R>
where
    R: WeeklyPlanRepository,
{
    store: Arc<WeeklyPlanStore<R>>,
}

impl<R> TimelineEngine<R>
where
    R: WeeklyPlanRepository,
{
    pub fn new(store: Arc<WeeklyPlanStore<R>>) -> Self {
        Self { store }
    }

    /// Stored day verbatim inside the active week, a freshly derived
    /// virtual day everywhere else.
    pub async fn get_day_plan(&self, date: CalendarDate) -> Result<DayPlan, PlannerError> {
        let plan = self.store.weekly_plan()?;
        if let Some(day) = plan.day(date) {
            return Ok(day.clone());
        }
        Ok(self.derive_virtual_day(date).await)
    }

    /// Builds a day from the sources without persisting it. Every block is
    /// `scheduled`; a source that fails is logged and contributes nothing.
    pub async fn derive_virtual_day(&self, date: CalendarDate) -> DayPlan {
        let day_of_week = DayOfWeek::from_date(date);
        let sources = self.store.sources();
        let (training, meals, calendar) = tokio::join!(
            sources.training.get_weekly_schedule(),
            sources.meals.get_weekly_plan(),
            sources.calendar.events_in_range(date, date),
        );

        let mut items: Vec<Normalized> = Vec::new();
        match training {
            Ok(schedule) => {
                let week = TrainingWeek::from_schedule(schedule);
                items.extend(normalize_workout(date, week.day(day_of_week)));
            }
            Err(error) => log_source_gap(SourceDomain::Training, date, &error),
        }
        match meals {
            Ok(plan) => {
                let week = MealWeek::from_plan(plan);
                items.extend(
                    week.meals(day_of_week)
                        .iter()
                        .map(|meal| normalize_meal(date, meal)),
                );
            }
            Err(error) => log_source_gap(SourceDomain::Meals, date, &error),
        }
        match calendar {
            Ok(Some(mut range)) => {
                let events = range.remove(&date).unwrap_or_default();
                items.extend(
                    events
                        .iter()
                        .map(|event| normalize_calendar_event(date, event)),
                );
            }
            Ok(None) => {
                debug!(date = %format_date(date), "calendar source has no range queries; virtual day omits events");
            }
            Err(error) => log_source_gap(SourceDomain::Calendar, date, &error),
        }

        let mut blocks = collect_blocks(date, items);
        let policy = self.store.policy();
        if policy.include_sleep_blocks {
            blocks.extend(sleep_block(date, policy));
        }
        DayPlan::from_blocks(date, blocks)
    }
}

fn log_source_gap(domain: SourceDomain, date: CalendarDate, error: &PlannerError) {
    warn!(
        domain = %domain,
        date = %format_date(date),
        %error,
        "source unavailable while deriving virtual day"
    );
}
