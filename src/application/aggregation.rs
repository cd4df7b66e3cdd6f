use crate::application::normalizer::{MealWeek, TrainingWeek};
use crate::application::plan_store::WeeklyPlanStore;
use crate::application::timeline::TimelineEngine;
use crate::domain::dates::{month_dates, CalendarDate, DayOfWeek};
use crate::domain::models::{DayPlan, SourceDomain};
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::plan_repository::WeeklyPlanRepository;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// A day plan with its read-time derived figures.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DaySummary {
    #[serde(flatten)]
    pub day: DayPlan,
    pub completion_rate: u32,
    pub total_free_minutes: u32,
}

impl DaySummary {
    pub fn from_day(day: DayPlan, waking_minutes: u32) -> Self {
        Self {
            completion_rate: day.completion_rate(),
            total_free_minutes: day.total_free_minutes(waking_minutes),
            day,
        }
    }
}

pub struct AggregationView<R>
where
    R: WeeklyPlanRepository,
{
    store: Arc<WeeklyPlanStore<R>>,
    engine: Arc<TimelineEngine<R>>,
}

impl<R> AggregationView<R>
where
    R: WeeklyPlanRepository,
{
    pub fn new(store: Arc<WeeklyPlanStore<R>>, engine: Arc<TimelineEngine<R>>) -> Self {
        Self { store, engine }
    }

    /// Dates of the month that have something planned. Days of the active
    /// week answer from storage; every other day only checks whether its
    /// weekday has a workout or meals, so calendar-only days outside the
    /// active week are not marked.
    pub async fn month_index(
        &self,
        year: i32,
        month: u32,
    ) -> Result<BTreeSet<CalendarDate>, PlannerError> {
        let dates = month_dates(year, month)?;
        let plan = self.store.weekly_plan()?;

        let needs_sources = dates.iter().any(|date| !plan.contains(*date));
        let (training, meals) = if needs_sources {
            let sources = self.store.sources();
            let (schedule, meal_plan) = tokio::join!(
                sources.training.get_weekly_schedule(),
                sources.meals.get_weekly_plan(),
            );
            let training = schedule
                .map(TrainingWeek::from_schedule)
                .unwrap_or_else(|error| {
                    warn!(domain = %SourceDomain::Training, %error, "month index treats training as empty");
                    TrainingWeek::default()
                });
            let meals = meal_plan.map(MealWeek::from_plan).unwrap_or_else(|error| {
                warn!(domain = %SourceDomain::Meals, %error, "month index treats meals as empty");
                MealWeek::default()
            });
            (training, meals)
        } else {
            (TrainingWeek::default(), MealWeek::default())
        };

        let index = dates
            .into_iter()
            .filter(|date| match plan.day(*date) {
                Some(day) => day.active_block_count() > 0,
                None => {
                    let day_of_week = DayOfWeek::from_date(*date);
                    training.has_workout(day_of_week) || meals.has_meals(day_of_week)
                }
            })
            .collect::<BTreeSet<_>>();
        debug!(year, month, marked = index.len(), "built month index");
        Ok(index)
    }

    pub async fn day_summary(&self, date: CalendarDate) -> Result<DaySummary, PlannerError> {
        let day = self.engine.get_day_plan(date).await?;
        Ok(DaySummary::from_day(day, self.store.policy().waking_minutes()))
    }
}
