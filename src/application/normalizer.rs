//! Converts native source records into canonical [`TimeBlock`]s.
//!
//! Day addressing is settled here, once: training days arrive by name and
//! meal days by name or by a Monday = 1 .. Sunday = 7 number, and both are
//! folded into [`DayOfWeek`] before anything downstream sees them.

use crate::domain::dates::{
    format_date, format_hhmm, parse_hhmm, span_minutes, CalendarDate, DayOfWeek, MINUTES_PER_DAY,
};
use crate::domain::models::{BlockKind, BlockStatus, PlannerPolicy, TimeBlock};
use crate::infrastructure::sources::{
    CalendarEvent, MealDayResolution, MealDay, MealEntry, TrainingDay,
};
use std::collections::HashSet;
use tracing::warn;

pub const WORKOUT_START_MINUTES: u32 = 7 * 60;
pub const DEFAULT_WORKOUT_MINUTES: u32 = 45;
pub const MEAL_DISPLAY_MINUTES: u32 = 30;
pub const WORKOUT_COLOR: &str = "#FF6B35";
pub const MEAL_COLOR: &str = "#4CAF50";

/// Outcome of normalizing one source record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Block(TimeBlock),
    Skip { reason: String },
}

impl Normalized {
    fn skip(reason: impl Into<String>) -> Self {
        Self::Skip {
            reason: reason.into(),
        }
    }
}

/// Training schedule indexed by canonical day.
#[derive(Debug, Clone, Default)]
pub struct TrainingWeek {
    days: [Option<TrainingDay>; 7],
}

impl TrainingWeek {
    pub fn from_schedule(schedule: Vec<TrainingDay>) -> Self {
        let mut week = Self::default();
        for entry in schedule {
            let Some(day) = entry.resolve_day() else {
                warn!(day_of_week = %entry.day_of_week, "skipping training entry with unknown day");
                continue;
            };
            week.days[day.index()] = Some(entry);
        }
        week
    }

    pub fn day(&self, day: DayOfWeek) -> Option<&TrainingDay> {
        self.days[day.index()].as_ref()
    }

    pub fn has_workout(&self, day: DayOfWeek) -> bool {
        self.day(day)
            .is_some_and(|entry| !entry.is_rest_day && entry.workout.is_some())
    }
}

/// Meal plan indexed by canonical day.
#[derive(Debug, Clone, Default)]
pub struct MealWeek {
    days: [Vec<MealEntry>; 7],
}

impl MealWeek {
    pub fn from_plan(plan: Vec<MealDay>) -> Self {
        let mut week = Self::default();
        for entry in plan {
            let day = match entry.resolve_day() {
                MealDayResolution::Resolved(day) => day,
                MealDayResolution::Conflicting { by_name, by_number } => {
                    warn!(
                        by_name = %by_name,
                        by_number = %by_number,
                        "meal day name and number disagree; using the name"
                    );
                    by_name
                }
                MealDayResolution::Unresolved => {
                    warn!(
                        day_name = ?entry.day_name,
                        day_number = ?entry.day_number,
                        "skipping meal day that resolves to no day of week"
                    );
                    continue;
                }
            };
            week.days[day.index()].extend(entry.meals);
        }
        week
    }

    pub fn meals(&self, day: DayOfWeek) -> &[MealEntry] {
        &self.days[day.index()]
    }

    pub fn has_meals(&self, day: DayOfWeek) -> bool {
        !self.meals(day).is_empty()
    }
}

/// `None` when there is nothing to place: a rest day or no assigned workout.
pub fn normalize_workout(date: CalendarDate, entry: Option<&TrainingDay>) -> Option<Normalized> {
    let entry = entry?;
    if entry.is_rest_day {
        return None;
    }
    let workout = entry.workout.as_ref()?;
    let name = workout.name.trim();
    if name.is_empty() {
        return Some(Normalized::skip(format!(
            "workout on {} has no name",
            entry.day_of_week
        )));
    }

    let duration = workout
        .duration_minutes
        .filter(|minutes| *minutes > 0)
        .unwrap_or(DEFAULT_WORKOUT_MINUTES);
    if duration > MINUTES_PER_DAY {
        return Some(Normalized::skip(format!(
            "workout '{name}' on {} lasts {duration} minutes, longer than a day",
            entry.day_of_week
        )));
    }
    Some(Normalized::Block(TimeBlock {
        id: format!("workout-{}", format_date(date)),
        kind: BlockKind::Workout,
        title: name.to_string(),
        color: WORKOUT_COLOR.to_string(),
        start_time: format_hhmm(WORKOUT_START_MINUTES),
        end_time: format_hhmm(WORKOUT_START_MINUTES + duration),
        duration,
        status: BlockStatus::Scheduled,
        is_all_day: false,
        related_id: Some(format!("training:{}", entry.day_of_week.trim())),
    }))
}

pub fn meal_start_minutes(meal_type: &str) -> u32 {
    match meal_type.trim().to_ascii_lowercase().as_str() {
        "breakfast" => 8 * 60,
        "lunch" => 12 * 60,
        "snack" => 15 * 60,
        "dinner" => 18 * 60,
        _ => 12 * 60,
    }
}

pub fn normalize_meal(date: CalendarDate, meal: &MealEntry) -> Normalized {
    let meal_type = meal.meal_type.trim();
    let name = meal.name.trim();
    if meal_type.is_empty() {
        return Normalized::skip(format!("meal '{name}' has no meal type"));
    }
    if name.is_empty() {
        return Normalized::skip(format!("{meal_type} meal has no name"));
    }

    let start = meal_start_minutes(meal_type);
    let meal_key = meal_type.to_ascii_lowercase();
    Normalized::Block(TimeBlock {
        id: format!("meal-{}-{}-{}", format_date(date), slug(&meal_key), slug(name)),
        kind: BlockKind::MealEating,
        title: format!("{}: {name}", capitalize(meal_type)),
        color: MEAL_COLOR.to_string(),
        start_time: format_hhmm(start),
        end_time: format_hhmm(start + MEAL_DISPLAY_MINUTES),
        duration: MEAL_DISPLAY_MINUTES,
        status: BlockStatus::Scheduled,
        is_all_day: false,
        related_id: Some(meal_key),
    })
}

pub fn normalize_calendar_event(date: CalendarDate, event: &CalendarEvent) -> Normalized {
    let title = event.title.trim();
    let title = if title.is_empty() { "Busy" } else { title };
    let id = match event.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
        Some(event_id) => format!("cal-{}-{}", format_date(date), slug(event_id)),
        None => format!(
            "cal-{}-{}-{}",
            format_date(date),
            slug(title),
            slug(event.start_time.as_deref().unwrap_or("all-day"))
        ),
    };

    if event.is_all_day {
        return Normalized::Block(TimeBlock {
            id,
            kind: BlockKind::AllDayEvent,
            title: title.to_string(),
            color: event.color.clone(),
            start_time: event
                .start_time
                .clone()
                .unwrap_or_else(|| format_hhmm(0)),
            end_time: event
                .end_time
                .clone()
                .unwrap_or_else(|| format_hhmm(MINUTES_PER_DAY - 1)),
            duration: MINUTES_PER_DAY,
            status: BlockStatus::Scheduled,
            is_all_day: true,
            related_id: event.id.clone(),
        });
    }

    let (Some(start_time), Some(end_time)) = (event.start_time.as_deref(), event.end_time.as_deref())
    else {
        return Normalized::skip(format!("calendar event '{title}' has no time window"));
    };
    let (Some(start), Some(end)) = (parse_hhmm(start_time), parse_hhmm(end_time)) else {
        return Normalized::skip(format!(
            "calendar event '{title}' has malformed times {start_time}-{end_time}"
        ));
    };

    Normalized::Block(TimeBlock {
        id,
        kind: BlockKind::CalendarEvent,
        title: title.to_string(),
        color: event.color.clone(),
        start_time: start_time.to_string(),
        end_time: end_time.to_string(),
        duration: span_minutes(start, end),
        status: BlockStatus::Scheduled,
        is_all_day: false,
        related_id: event.id.clone(),
    })
}

pub fn sleep_block(date: CalendarDate, policy: &PlannerPolicy) -> Option<TimeBlock> {
    let start = parse_hhmm(&policy.sleep_time)?;
    let end = parse_hhmm(&policy.wake_time)?;
    Some(TimeBlock {
        id: format!("sleep-{}", format_date(date)),
        kind: BlockKind::Sleep,
        title: "Sleep".to_string(),
        color: policy.sleep_color.clone(),
        start_time: policy.sleep_time.clone(),
        end_time: policy.wake_time.clone(),
        duration: span_minutes(start, end),
        status: BlockStatus::Scheduled,
        is_all_day: false,
        related_id: None,
    })
}

/// Keeps the blocks, logs and drops the skips, and makes ids unique within
/// the day by suffixing repeats.
pub fn collect_blocks(
    date: CalendarDate,
    items: impl IntoIterator<Item = Normalized>,
) -> Vec<TimeBlock> {
    let mut seen = HashSet::new();
    let mut blocks = Vec::new();
    for item in items {
        match item {
            Normalized::Block(mut block) => {
                if !seen.insert(block.id.clone()) {
                    let base = block.id.clone();
                    let mut suffix = 2;
                    while !seen.insert(format!("{base}-{suffix}")) {
                        suffix += 1;
                    }
                    block.id = format!("{base}-{suffix}");
                }
                blocks.push(block);
            }
            Normalized::Skip { reason } => {
                warn!(date = %format_date(date), %reason, "skipping malformed source record");
            }
        }
    }
    blocks
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn slug(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for character in value.trim().chars() {
        if character.is_ascii_alphanumeric() {
            slug.push(character.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let trimmed = slug.trim_matches('-');
    if trimmed.is_empty() {
        "item".to_string()
    } else {
        trimmed.to_string()
    }
}
