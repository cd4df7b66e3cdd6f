use crate::domain::dates::format_date;
use crate::domain::models::WeeklyPlan;
use crate::infrastructure::error::PlannerError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub fn initialize_database(path: &Path) -> Result<(), PlannerError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Durable home of the single active WeeklyPlan for one user.
pub trait WeeklyPlanRepository: Send + Sync {
    fn load(&self) -> Result<Option<WeeklyPlan>, PlannerError>;
    fn save(&self, plan: &WeeklyPlan) -> Result<(), PlannerError>;
}

#[derive(Debug, Clone)]
pub struct SqliteWeeklyPlanRepository {
    db_path: PathBuf,
    user_id: String,
}

impl SqliteWeeklyPlanRepository {
    pub fn new(db_path: impl AsRef<Path>, user_id: impl Into<String>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            user_id: user_id.into(),
        }
    }

    fn connect(&self) -> Result<Connection, PlannerError> {
        Connection::open(&self.db_path).map_err(PlannerError::from)
    }
}

impl WeeklyPlanRepository for SqliteWeeklyPlanRepository {
    fn load(&self) -> Result<Option<WeeklyPlan>, PlannerError> {
        let connection = self.connect()?;
        let payload: Option<String> = connection
            .query_row(
                "SELECT payload FROM weekly_plans WHERE user_id = ?1",
                params![self.user_id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(payload) = payload else {
            return Ok(None);
        };
        let plan: WeeklyPlan = serde_json::from_str(&payload)?;
        plan.validate().map_err(|message| {
            PlannerError::Storage(format!(
                "stored weekly plan for user '{}' is invalid: {message}",
                self.user_id
            ))
        })?;
        Ok(Some(plan))
    }

    fn save(&self, plan: &WeeklyPlan) -> Result<(), PlannerError> {
        let payload = serde_json::to_string(plan)?;
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO weekly_plans (user_id, week_start_date, payload, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO UPDATE SET
               week_start_date = excluded.week_start_date,
               payload = excluded.payload,
               updated_at = excluded.updated_at",
            params![
                self.user_id,
                format_date(plan.week_start_date),
                payload,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryWeeklyPlanRepository {
    plan: Mutex<Option<WeeklyPlan>>,
}

impl InMemoryWeeklyPlanRepository {
    pub fn with_plan(plan: WeeklyPlan) -> Self {
        Self {
            plan: Mutex::new(Some(plan)),
        }
    }
}

impl WeeklyPlanRepository for InMemoryWeeklyPlanRepository {
    fn load(&self) -> Result<Option<WeeklyPlan>, PlannerError> {
        let plan = self
            .plan
            .lock()
            .map_err(|error| PlannerError::Storage(format!("weekly plan lock poisoned: {error}")))?;
        Ok(plan.clone())
    }

    fn save(&self, plan: &WeeklyPlan) -> Result<(), PlannerError> {
        let mut stored = self
            .plan
            .lock()
            .map_err(|error| PlannerError::Storage(format!("weekly plan lock poisoned: {error}")))?;
        *stored = Some(plan.clone());
        Ok(())
    }
}
