use crate::domain::dates::{CalendarDate, DayOfWeek};
use crate::infrastructure::error::PlannerError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlannedWorkout {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TrainingDay {
    pub day_of_week: String,
    #[serde(default)]
    pub workout: Option<PlannedWorkout>,
    #[serde(default)]
    pub is_rest_day: bool,
}

impl TrainingDay {
    pub fn resolve_day(&self) -> Option<DayOfWeek> {
        DayOfWeek::from_name(&self.day_of_week)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MealEntry {
    pub meal_type: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MealDay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_number: Option<u8>,
    #[serde(default)]
    pub meals: Vec<MealEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MealDayResolution {
    Resolved(DayOfWeek),
    /// Name and number point at different days; the name wins.
    Conflicting { by_name: DayOfWeek, by_number: DayOfWeek },
    Unresolved,
}

impl MealDay {
    pub fn resolve_day(&self) -> MealDayResolution {
        let by_name = self.day_name.as_deref().and_then(DayOfWeek::from_name);
        let by_number = self.day_number.and_then(DayOfWeek::from_day_number);
        match (by_name, by_number) {
            (Some(by_name), Some(by_number)) if by_name != by_number => {
                MealDayResolution::Conflicting { by_name, by_number }
            }
            (Some(day), _) | (None, Some(day)) => MealDayResolution::Resolved(day),
            (None, None) => MealDayResolution::Unresolved,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default)]
    pub is_all_day: bool,
    #[serde(default)]
    pub color: String,
}

pub type CalendarRange = BTreeMap<CalendarDate, Vec<CalendarEvent>>;

#[async_trait]
pub trait TrainingSource: Send + Sync {
    async fn get_weekly_schedule(&self) -> Result<Vec<TrainingDay>, PlannerError>;
}

#[async_trait]
pub trait MealSource: Send + Sync {
    async fn get_weekly_plan(&self) -> Result<Vec<MealDay>, PlannerError>;
}

#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn get_events_for_date(
        &self,
        date: CalendarDate,
    ) -> Result<Vec<CalendarEvent>, PlannerError>;

    /// `Ok(None)` means the adapter cannot answer range queries.
    async fn events_in_range(
        &self,
        _start: CalendarDate,
        _end: CalendarDate,
    ) -> Result<Option<CalendarRange>, PlannerError> {
        Ok(None)
    }
}

#[derive(Clone)]
pub struct SourceSet {
    pub training: Arc<dyn TrainingSource>,
    pub meals: Arc<dyn MealSource>,
    pub calendar: Arc<dyn CalendarSource>,
}

impl SourceSet {
    pub fn new(
        training: Arc<dyn TrainingSource>,
        meals: Arc<dyn MealSource>,
        calendar: Arc<dyn CalendarSource>,
    ) -> Self {
        Self {
            training,
            meals,
            calendar,
        }
    }
}
