//! Scripted source adapters and fixtures shared by the unit tests.

use crate::domain::dates::{parse_local_date, CalendarDate};
use crate::domain::models::SourceDomain;
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::sources::{
    CalendarEvent, CalendarRange, CalendarSource, MealDay, MealEntry, MealSource, PlannedWorkout,
    SourceSet, TrainingDay, TrainingSource,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

pub fn date(value: &str) -> CalendarDate {
    parse_local_date(value).expect("valid date")
}

pub fn training_day(day: &str, workout: Option<(&str, u32)>) -> TrainingDay {
    TrainingDay {
        day_of_week: day.to_string(),
        workout: workout.map(|(name, minutes)| PlannedWorkout {
            name: name.to_string(),
            duration_minutes: Some(minutes),
        }),
        is_rest_day: false,
    }
}

pub fn rest_day(day: &str) -> TrainingDay {
    TrainingDay {
        day_of_week: day.to_string(),
        workout: None,
        is_rest_day: true,
    }
}

pub fn meal_day(day_name: &str, meals: &[(&str, &str)]) -> MealDay {
    MealDay {
        day_name: Some(day_name.to_string()),
        day_number: None,
        meals: meals
            .iter()
            .map(|(meal_type, name)| MealEntry {
                meal_type: meal_type.to_string(),
                name: name.to_string(),
            })
            .collect(),
    }
}

pub fn timed_event(id: &str, title: &str, start: &str, end: &str) -> CalendarEvent {
    CalendarEvent {
        id: Some(id.to_string()),
        title: title.to_string(),
        start_time: Some(start.to_string()),
        end_time: Some(end.to_string()),
        is_all_day: false,
        color: "#1E88E5".to_string(),
    }
}

/// Holds a fake's calls open until the test releases them.
#[derive(Debug, Clone)]
pub struct Gate {
    permits: Arc<Semaphore>,
}

impl Gate {
    pub fn closed() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn release(&self, count: usize) {
        self.permits.add_permits(count);
    }

    async fn pass(&self) {
        let permit = self.permits.acquire().await.expect("gate semaphore open");
        permit.forget();
    }
}

#[derive(Debug, Default)]
pub struct FakeTrainingSource {
    schedule: Mutex<Vec<TrainingDay>>,
    failure: Mutex<Option<String>>,
    gate: Mutex<Option<Gate>>,
    pub calls: AtomicUsize,
}

impl FakeTrainingSource {
    pub fn with_schedule(schedule: Vec<TrainingDay>) -> Self {
        Self {
            schedule: Mutex::new(schedule),
            ..Self::default()
        }
    }

    pub fn set_schedule(&self, schedule: Vec<TrainingDay>) {
        *self.schedule.lock().expect("schedule lock") = schedule;
    }

    pub fn fail_with(&self, message: Option<&str>) {
        *self.failure.lock().expect("failure lock") = message.map(ToOwned::to_owned);
    }

    pub fn gate(&self, gate: Option<Gate>) {
        *self.gate.lock().expect("gate lock") = gate;
    }
}

#[async_trait]
impl TrainingSource for FakeTrainingSource {
    async fn get_weekly_schedule(&self) -> Result<Vec<TrainingDay>, PlannerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().expect("gate lock").clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        if let Some(message) = self.failure.lock().expect("failure lock").clone() {
            return Err(PlannerError::Storage(message));
        }
        Ok(self.schedule.lock().expect("schedule lock").clone())
    }
}

#[derive(Debug, Default)]
pub struct FakeMealSource {
    plan: Mutex<Vec<MealDay>>,
    failure: Mutex<Option<String>>,
    scoped_failure: Mutex<Option<(SourceDomain, String)>>,
    gate: Mutex<Option<Gate>>,
    pub calls: AtomicUsize,
}

impl FakeMealSource {
    pub fn with_plan(plan: Vec<MealDay>) -> Self {
        Self {
            plan: Mutex::new(plan),
            ..Self::default()
        }
    }

    pub fn set_plan(&self, plan: Vec<MealDay>) {
        *self.plan.lock().expect("plan lock") = plan;
    }

    pub fn fail_with(&self, message: Option<&str>) {
        *self.failure.lock().expect("failure lock") = message.map(ToOwned::to_owned);
    }

    /// Fails with an adapter error that names `domain` itself.
    pub fn fail_as_source(&self, domain: SourceDomain, message: &str) {
        *self.scoped_failure.lock().expect("failure lock") = Some((domain, message.to_owned()));
    }

    pub fn gate(&self, gate: Option<Gate>) {
        *self.gate.lock().expect("gate lock") = gate;
    }
}

#[async_trait]
impl MealSource for FakeMealSource {
    async fn get_weekly_plan(&self) -> Result<Vec<MealDay>, PlannerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().expect("gate lock").clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        if let Some((domain, message)) = self.scoped_failure.lock().expect("failure lock").clone() {
            return Err(PlannerError::SourceAdapter { domain, message });
        }
        if let Some(message) = self.failure.lock().expect("failure lock").clone() {
            return Err(PlannerError::Storage(message));
        }
        Ok(self.plan.lock().expect("plan lock").clone())
    }
}

#[derive(Debug, Default)]
pub struct FakeCalendarSource {
    events: Mutex<HashMap<CalendarDate, Vec<CalendarEvent>>>,
    failure: Mutex<Option<String>>,
    supports_range: bool,
    pub calls: AtomicUsize,
}

impl FakeCalendarSource {
    pub fn with_range_queries() -> Self {
        Self {
            supports_range: true,
            ..Self::default()
        }
    }

    pub fn set_events(&self, date: CalendarDate, events: Vec<CalendarEvent>) {
        self.events
            .lock()
            .expect("events lock")
            .insert(date, events);
    }

    pub fn fail_with(&self, message: Option<&str>) {
        *self.failure.lock().expect("failure lock") = message.map(ToOwned::to_owned);
    }

    fn check_failure(&self) -> Result<(), PlannerError> {
        match self.failure.lock().expect("failure lock").clone() {
            Some(message) => Err(PlannerError::Storage(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CalendarSource for FakeCalendarSource {
    async fn get_events_for_date(
        &self,
        date: CalendarDate,
    ) -> Result<Vec<CalendarEvent>, PlannerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(self
            .events
            .lock()
            .expect("events lock")
            .get(&date)
            .cloned()
            .unwrap_or_default())
    }

    async fn events_in_range(
        &self,
        start: CalendarDate,
        end: CalendarDate,
    ) -> Result<Option<CalendarRange>, PlannerError> {
        if !self.supports_range {
            return Ok(None);
        }
        self.check_failure()?;
        Ok(Some(
            self.events
                .lock()
                .expect("events lock")
                .iter()
                .filter(|(date, _)| **date >= start && **date <= end)
                .map(|(date, events)| (*date, events.clone()))
                .collect(),
        ))
    }
}

pub struct FakeSources {
    pub training: Arc<FakeTrainingSource>,
    pub meals: Arc<FakeMealSource>,
    pub calendar: Arc<FakeCalendarSource>,
}

impl FakeSources {
    pub fn new(training: FakeTrainingSource, meals: FakeMealSource, calendar: FakeCalendarSource) -> Self {
        Self {
            training: Arc::new(training),
            meals: Arc::new(meals),
            calendar: Arc::new(calendar),
        }
    }

    pub fn source_set(&self) -> SourceSet {
        SourceSet::new(
            Arc::clone(&self.training) as Arc<dyn TrainingSource>,
            Arc::clone(&self.meals) as Arc<dyn MealSource>,
            Arc::clone(&self.calendar) as Arc<dyn CalendarSource>,
        )
    }
}

/// Week of 2025-01-05: Monday rest with oats and salad, Tuesday leg day,
/// one standup on Monday.
pub fn sample_sources() -> FakeSources {
    let sources = FakeSources::new(
        FakeTrainingSource::with_schedule(vec![
            rest_day("Monday"),
            training_day("Tuesday", Some(("Leg Day", 50))),
            training_day("Thursday", Some(("Upper Body", 40))),
        ]),
        FakeMealSource::with_plan(vec![meal_day(
            "Monday",
            &[("breakfast", "Oats"), ("lunch", "Salad")],
        )]),
        FakeCalendarSource::default(),
    );
    sources.calendar.set_events(
        date("2025-01-06"),
        vec![timed_event("evt-standup", "Standup", "09:00", "09:15")],
    );
    sources
}
