//! File-backed source adapters reading the `config/*.json` source documents.

use crate::domain::dates::{parse_local_date, CalendarDate};
use crate::infrastructure::config::parse_config;
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::sources::{
    CalendarEvent, CalendarRange, CalendarSource, MealDay, MealSource, TrainingDay,
    TrainingSource,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::warn;

// Records stay raw so one malformed entry cannot reject the whole document.
#[derive(Debug, Deserialize)]
struct TrainingFile {
    #[serde(default)]
    days: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct MealsFile {
    #[serde(default)]
    days: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CalendarFile {
    #[serde(default)]
    events: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct DatedCalendarEvent {
    date: String,
    #[serde(flatten)]
    event: CalendarEvent,
}

async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, PlannerError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let value = parse_config(&raw, path)?;
    Ok(serde_json::from_value(value)?)
}

fn decode_records<T: DeserializeOwned>(kind: &'static str, records: Vec<Value>) -> Vec<T> {
    records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match serde_json::from_value(record) {
            Ok(decoded) => Some(decoded),
            Err(error) => {
                warn!(kind, index, %error, "skipping malformed source record");
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct JsonTrainingSource {
    path: PathBuf,
}

impl JsonTrainingSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl TrainingSource for JsonTrainingSource {
    async fn get_weekly_schedule(&self) -> Result<Vec<TrainingDay>, PlannerError> {
        let file: TrainingFile = read_document(&self.path).await?;
        Ok(decode_records("training day", file.days))
    }
}

#[derive(Debug, Clone)]
pub struct JsonMealSource {
    path: PathBuf,
}

impl JsonMealSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl MealSource for JsonMealSource {
    async fn get_weekly_plan(&self) -> Result<Vec<MealDay>, PlannerError> {
        let file: MealsFile = read_document(&self.path).await?;
        Ok(decode_records("meal day", file.days))
    }
}

#[derive(Debug, Clone)]
pub struct JsonCalendarSource {
    path: PathBuf,
}

impl JsonCalendarSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    async fn dated_events(&self) -> Result<Vec<(CalendarDate, CalendarEvent)>, PlannerError> {
        let file: CalendarFile = read_document(&self.path).await?;
        Ok(decode_records::<DatedCalendarEvent>("calendar event", file.events)
            .into_iter()
            .filter_map(|entry| match parse_local_date(entry.date.trim()) {
                Ok(date) => Some((date, entry.event)),
                Err(error) => {
                    warn!(title = %entry.event.title, %error, "skipping calendar entry with malformed date");
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl CalendarSource for JsonCalendarSource {
    async fn get_events_for_date(
        &self,
        date: CalendarDate,
    ) -> Result<Vec<CalendarEvent>, PlannerError> {
        Ok(self
            .dated_events()
            .await?
            .into_iter()
            .filter(|(event_date, _)| *event_date == date)
            .map(|(_, event)| event)
            .collect())
    }

    async fn events_in_range(
        &self,
        start: CalendarDate,
        end: CalendarDate,
    ) -> Result<Option<CalendarRange>, PlannerError> {
        let mut range = CalendarRange::new();
        for (date, event) in self.dated_events().await? {
            if date >= start && date <= end {
                range.entry(date).or_default().push(event);
            }
        }
        Ok(Some(range))
    }
}
