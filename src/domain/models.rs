use crate::domain::dates::{
    parse_hhmm, span_minutes, week_dates, CalendarDate, DayOfWeek, MINUTES_PER_DAY,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Workout,
    MealEating,
    MealPrep,
    CalendarEvent,
    Sleep,
    Buffer,
    AllDayEvent,
}

impl BlockKind {
    /// The upstream source that owns blocks of this kind, if any.
    pub fn domain(self) -> Option<SourceDomain> {
        match self {
            Self::Workout => Some(SourceDomain::Training),
            Self::MealEating | Self::MealPrep => Some(SourceDomain::Meals),
            Self::CalendarEvent | Self::AllDayEvent => Some(SourceDomain::Calendar),
            Self::Sleep | Self::Buffer => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    Scheduled,
    Completed,
    Skipped,
}

impl FromStr for BlockStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Ok(Self::Scheduled),
            "completed" => Ok(Self::Completed),
            "skipped" => Ok(Self::Skipped),
            other => Err(format!("unknown block status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SourceDomain {
    Training,
    Meals,
    Calendar,
}

impl SourceDomain {
    pub const ALL: [SourceDomain; 3] = [Self::Training, Self::Meals, Self::Calendar];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::Meals => "meals",
            Self::Calendar => "calendar",
        }
    }
}

impl fmt::Display for SourceDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceDomain {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "training" | "workouts" | "workout" => Ok(Self::Training),
            "meals" | "meal" => Ok(Self::Meals),
            "calendar" => Ok(Self::Calendar),
            other => Err(format!("unknown source domain: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DomainFailure {
    pub domain: SourceDomain,
    pub message: String,
}

impl fmt::Display for DomainFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.domain, self.message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimeBlock {
    pub id: String,
    pub kind: BlockKind,
    pub title: String,
    pub color: String,
    pub start_time: String,
    pub end_time: String,
    pub duration: u32,
    pub status: BlockStatus,
    pub is_all_day: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
}

impl TimeBlock {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "block.id")?;
        validate_non_empty(&self.title, "block.title")?;
        if self.is_all_day {
            return Ok(());
        }
        validate_hhmm(&self.start_time, "block.start_time")?;
        validate_hhmm(&self.end_time, "block.end_time")?;
        Ok(())
    }

    pub fn domain(&self) -> Option<SourceDomain> {
        self.kind.domain()
    }

    pub fn is_sleep(&self) -> bool {
        self.kind == BlockKind::Sleep
    }

    pub fn start_minutes(&self) -> Option<u32> {
        parse_hhmm(&self.start_time)
    }

    fn order_key(&self) -> (bool, u32) {
        if self.is_all_day {
            return (false, 0);
        }
        (true, self.start_minutes().unwrap_or(u32::MAX))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DayPlan {
    pub date: CalendarDate,
    pub blocks: Vec<TimeBlock>,
}

impl DayPlan {
    pub fn empty(date: CalendarDate) -> Self {
        Self {
            date,
            blocks: Vec::new(),
        }
    }

    pub fn from_blocks(date: CalendarDate, blocks: Vec<TimeBlock>) -> Self {
        let mut day = Self { date, blocks };
        day.sort_blocks();
        day
    }

    /// All-day blocks lead in their original order; the rest follow by
    /// `start_time`. The sort is stable, so equal start times keep source order.
    pub fn sort_blocks(&mut self) {
        self.blocks.sort_by_key(TimeBlock::order_key);
    }

    pub fn timed_blocks(&self) -> impl Iterator<Item = &TimeBlock> {
        self.blocks.iter().filter(|block| !block.is_all_day)
    }

    pub fn all_day_blocks(&self) -> impl Iterator<Item = &TimeBlock> {
        self.blocks.iter().filter(|block| block.is_all_day)
    }

    pub fn block(&self, block_id: &str) -> Option<&TimeBlock> {
        self.blocks.iter().find(|block| block.id == block_id)
    }

    pub fn block_mut(&mut self, block_id: &str) -> Option<&mut TimeBlock> {
        self.blocks.iter_mut().find(|block| block.id == block_id)
    }

    pub fn active_block_count(&self) -> usize {
        self.blocks.iter().filter(|block| !block.is_sleep()).count()
    }

    /// Percentage of non-sleep blocks that are completed, rounded half up.
    pub fn completion_rate(&self) -> u32 {
        let total = self.active_block_count() as u64;
        if total == 0 {
            return 0;
        }
        let completed = self
            .blocks
            .iter()
            .filter(|block| !block.is_sleep() && block.status == BlockStatus::Completed)
            .count() as u64;
        ((200 * completed + total) / (2 * total)) as u32
    }

    pub fn total_free_minutes(&self, waking_minutes: u32) -> u32 {
        let busy = self
            .blocks
            .iter()
            .filter(|block| !block.is_sleep() && !block.is_all_day)
            .fold(0u32, |sum, block| sum.saturating_add(block.duration));
        waking_minutes.saturating_sub(busy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyPlan {
    pub week_start_date: CalendarDate,
    pub days: Vec<DayPlan>,
}

impl WeeklyPlan {
    pub fn empty(week_start_date: CalendarDate) -> Self {
        Self {
            week_start_date,
            days: week_dates(week_start_date)
                .into_iter()
                .map(DayPlan::empty)
                .collect(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if DayOfWeek::from_date(self.week_start_date) != DayOfWeek::Sunday {
            return Err("weekly_plan.week_start_date must be a Sunday".to_string());
        }
        if self.days.len() != 7 {
            return Err("weekly_plan.days must hold exactly 7 days".to_string());
        }
        for (day, expected) in self.days.iter().zip(week_dates(self.week_start_date)) {
            if day.date != expected {
                return Err(format!(
                    "weekly_plan.days out of order: expected {expected}, found {}",
                    day.date
                ));
            }
            for block in &day.blocks {
                block.validate()?;
            }
        }
        Ok(())
    }

    pub fn dates(&self) -> [CalendarDate; 7] {
        week_dates(self.week_start_date)
    }

    pub fn contains(&self, date: CalendarDate) -> bool {
        self.day_index(date).is_some()
    }

    fn day_index(&self, date: CalendarDate) -> Option<usize> {
        let offset = (date - self.week_start_date).num_days();
        (0..7).contains(&offset).then_some(offset as usize)
    }

    pub fn day(&self, date: CalendarDate) -> Option<&DayPlan> {
        self.day_index(date).and_then(|index| self.days.get(index))
    }

    pub fn day_mut(&mut self, date: CalendarDate) -> Option<&mut DayPlan> {
        self.day_index(date).and_then(|index| self.days.get_mut(index))
    }

    /// Per-day copies of the blocks owned by `domain`, Sunday first.
    pub fn domain_blocks(&self, domain: SourceDomain) -> Vec<Vec<TimeBlock>> {
        self.days
            .iter()
            .map(|day| {
                day.blocks
                    .iter()
                    .filter(|block| block.domain() == Some(domain))
                    .cloned()
                    .collect()
            })
            .collect()
    }

    /// Replaces `domain`'s blocks day by day. Incoming blocks start out
    /// scheduled unless a block with the same id was already completed.
    pub fn merge_domain(&mut self, domain: SourceDomain, incoming: Vec<Vec<TimeBlock>>) {
        for (day, blocks) in self.days.iter_mut().zip(incoming) {
            let completed = day
                .blocks
                .iter()
                .filter(|block| {
                    block.domain() == Some(domain) && block.status == BlockStatus::Completed
                })
                .map(|block| block.id.clone())
                .collect::<HashSet<_>>();

            day.blocks.retain(|block| block.domain() != Some(domain));
            day.blocks.extend(blocks.into_iter().map(|mut block| {
                block.status = if completed.contains(&block.id) {
                    BlockStatus::Completed
                } else {
                    BlockStatus::Scheduled
                };
                block
            }));
            day.sort_blocks();
        }
    }

    /// Puts previously stored blocks back verbatim, statuses included.
    pub fn restore_domain(&mut self, domain: SourceDomain, stored: Vec<Vec<TimeBlock>>) {
        for (day, blocks) in self.days.iter_mut().zip(stored) {
            day.blocks.retain(|block| block.domain() != Some(domain));
            day.blocks.extend(blocks);
            day.sort_blocks();
        }
    }

    pub fn clear_domain(&mut self, domain: SourceDomain) {
        for day in &mut self.days {
            day.blocks.retain(|block| block.domain() != Some(domain));
        }
    }

    pub fn clear(&mut self) {
        for day in &mut self.days {
            day.blocks.clear();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlannerPolicy {
    pub wake_time: String,
    pub sleep_time: String,
    #[serde(default)]
    pub include_sleep_blocks: bool,
    #[serde(default = "default_sleep_color")]
    pub sleep_color: String,
}

impl Default for PlannerPolicy {
    fn default() -> Self {
        Self {
            wake_time: "07:00".to_string(),
            sleep_time: "23:00".to_string(),
            include_sleep_blocks: false,
            sleep_color: default_sleep_color(),
        }
    }
}

impl PlannerPolicy {
    pub fn validate(&self) -> Result<(), String> {
        validate_hhmm(&self.wake_time, "policy.wake_time")?;
        validate_hhmm(&self.sleep_time, "policy.sleep_time")?;
        if self.wake_time == self.sleep_time {
            return Err("policy.sleep_time must differ from policy.wake_time".to_string());
        }
        Ok(())
    }

    pub fn waking_minutes(&self) -> u32 {
        match (parse_hhmm(&self.wake_time), parse_hhmm(&self.sleep_time)) {
            (Some(wake), Some(sleep)) => span_minutes(wake, sleep),
            _ => MINUTES_PER_DAY,
        }
    }
}

fn default_sleep_color() -> String {
    "#5C6BC0".to_string()
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_hhmm(value: &str, field_name: &str) -> Result<(), String> {
    parse_hhmm(value)
        .map(|_| ())
        .ok_or_else(|| format!("{field_name} must be HH:MM"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dates::parse_local_date;
    use proptest::prelude::*;

    fn date(value: &str) -> CalendarDate {
        parse_local_date(value).expect("valid date")
    }

    fn block(id: &str, kind: BlockKind, start: &str, duration: u32) -> TimeBlock {
        TimeBlock {
            id: id.to_string(),
            kind,
            title: id.to_string(),
            color: "#000000".to_string(),
            start_time: start.to_string(),
            end_time: start.to_string(),
            duration,
            status: BlockStatus::Scheduled,
            is_all_day: false,
            related_id: None,
        }
    }

    fn all_day(id: &str) -> TimeBlock {
        TimeBlock {
            is_all_day: true,
            ..block(id, BlockKind::AllDayEvent, "00:00", 0)
        }
    }

    #[test]
    fn sort_blocks_puts_all_day_first_then_start_time() {
        let day = DayPlan::from_blocks(
            date("2025-01-06"),
            vec![
                block("dinner", BlockKind::MealEating, "18:00", 30),
                all_day("holiday"),
                block("workout", BlockKind::Workout, "07:00", 45),
                block("lunch", BlockKind::MealEating, "12:00", 30),
            ],
        );
        let ids = day.blocks.iter().map(|b| b.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["holiday", "workout", "lunch", "dinner"]);
        assert_eq!(day.all_day_blocks().count(), 1);
        assert_eq!(day.timed_blocks().count(), 3);
    }

    #[test]
    fn completion_rate_ignores_sleep_blocks() {
        let mut day = DayPlan::from_blocks(
            date("2025-01-06"),
            vec![
                block("a", BlockKind::MealEating, "08:00", 30),
                block("b", BlockKind::MealEating, "12:00", 30),
                block("c", BlockKind::Workout, "07:00", 45),
                block("sleep", BlockKind::Sleep, "23:00", 480),
            ],
        );
        assert_eq!(day.completion_rate(), 0);
        day.block_mut("a").expect("block a").status = BlockStatus::Completed;
        day.block_mut("sleep").expect("sleep").status = BlockStatus::Completed;
        assert_eq!(day.completion_rate(), 33);
        day.block_mut("b").expect("block b").status = BlockStatus::Completed;
        assert_eq!(day.completion_rate(), 67);
    }

    #[test]
    fn completion_rate_is_zero_for_empty_or_sleep_only_days() {
        assert_eq!(DayPlan::empty(date("2025-01-06")).completion_rate(), 0);
        let day = DayPlan::from_blocks(
            date("2025-01-06"),
            vec![block("sleep", BlockKind::Sleep, "23:00", 480)],
        );
        assert_eq!(day.completion_rate(), 0);
    }

    #[test]
    fn free_minutes_skip_sleep_and_all_day_blocks() {
        let mut holiday = all_day("holiday");
        holiday.duration = 1440;
        let day = DayPlan::from_blocks(
            date("2025-01-06"),
            vec![
                block("workout", BlockKind::Workout, "07:00", 45),
                block("lunch", BlockKind::MealEating, "12:00", 30),
                block("sleep", BlockKind::Sleep, "23:00", 480),
                holiday,
            ],
        );
        assert_eq!(day.total_free_minutes(960), 885);
    }

    #[test]
    fn weekly_plan_window_lookup() {
        let plan = WeeklyPlan::empty(date("2025-01-05"));
        assert!(plan.validate().is_ok());
        assert!(plan.contains(date("2025-01-05")));
        assert!(plan.contains(date("2025-01-11")));
        assert!(!plan.contains(date("2025-01-04")));
        assert!(!plan.contains(date("2025-01-12")));
        assert_eq!(
            plan.day(date("2025-01-06")).map(|day| day.date),
            Some(date("2025-01-06"))
        );
    }

    #[test]
    fn weekly_plan_validate_rejects_non_sunday_start() {
        let plan = WeeklyPlan::empty(date("2025-01-06"));
        assert!(plan.validate().is_err());
    }

    #[test]
    fn merge_domain_keeps_other_domains_and_completed_ids() {
        let mut plan = WeeklyPlan::empty(date("2025-01-05"));
        let monday = date("2025-01-06");
        {
            let day = plan.day_mut(monday).expect("monday");
            let mut breakfast = block("meal-breakfast", BlockKind::MealEating, "08:00", 30);
            breakfast.status = BlockStatus::Completed;
            let mut lunch = block("meal-lunch", BlockKind::MealEating, "12:00", 30);
            lunch.status = BlockStatus::Skipped;
            let mut meeting = block("cal-1", BlockKind::CalendarEvent, "09:00", 60);
            meeting.status = BlockStatus::Completed;
            day.blocks = vec![breakfast, lunch, meeting];
        }

        let mut incoming = vec![Vec::new(); 7];
        incoming[1] = vec![
            block("meal-breakfast", BlockKind::MealEating, "08:00", 30),
            block("meal-lunch", BlockKind::MealEating, "12:00", 30),
            block("meal-dinner", BlockKind::MealEating, "18:00", 30),
        ];
        plan.merge_domain(SourceDomain::Meals, incoming);

        let day = plan.day(monday).expect("monday");
        let status = |id: &str| day.block(id).expect("block present").status;
        assert_eq!(status("meal-breakfast"), BlockStatus::Completed);
        assert_eq!(status("meal-lunch"), BlockStatus::Scheduled);
        assert_eq!(status("meal-dinner"), BlockStatus::Scheduled);
        assert_eq!(status("cal-1"), BlockStatus::Completed);
        assert_eq!(day.blocks.len(), 4);
    }

    #[test]
    fn restore_and_clear_domain_touch_only_that_domain() {
        let mut plan = WeeklyPlan::empty(date("2025-01-05"));
        let monday = date("2025-01-06");
        plan.day_mut(monday).expect("monday").blocks = vec![
            block("workout", BlockKind::Workout, "07:00", 45),
            block("cal-1", BlockKind::CalendarEvent, "09:00", 60),
        ];
        let stored = plan.domain_blocks(SourceDomain::Calendar);

        plan.clear_domain(SourceDomain::Calendar);
        assert_eq!(plan.day(monday).expect("monday").blocks.len(), 1);

        plan.restore_domain(SourceDomain::Calendar, stored);
        let ids = plan
            .day(monday)
            .expect("monday")
            .blocks
            .iter()
            .map(|b| b.id.clone())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["workout".to_string(), "cal-1".to_string()]);
    }

    #[test]
    fn policy_validation_and_waking_minutes() {
        let policy = PlannerPolicy::default();
        assert!(policy.validate().is_ok());
        assert_eq!(policy.waking_minutes(), 960);

        let night_shift = PlannerPolicy {
            wake_time: "15:00".to_string(),
            sleep_time: "07:00".to_string(),
            ..PlannerPolicy::default()
        };
        assert_eq!(night_shift.waking_minutes(), 960);

        let broken = PlannerPolicy {
            sleep_time: "7pm".to_string(),
            ..PlannerPolicy::default()
        };
        assert!(broken.validate().is_err());
    }

    #[test]
    fn domain_and_status_parse_from_strings() {
        assert_eq!("workouts".parse::<SourceDomain>(), Ok(SourceDomain::Training));
        assert_eq!("Meals".parse::<SourceDomain>(), Ok(SourceDomain::Meals));
        assert!("sleep".parse::<SourceDomain>().is_err());
        assert_eq!("completed".parse::<BlockStatus>(), Ok(BlockStatus::Completed));
        assert!("done".parse::<BlockStatus>().is_err());
    }

    #[test]
    fn weekly_plan_serializes_with_camel_case_and_iso_dates() {
        let mut plan = WeeklyPlan::empty(date("2025-01-05"));
        plan.day_mut(date("2025-01-06")).expect("monday").blocks =
            vec![block("workout", BlockKind::Workout, "07:00", 45)];
        let json = serde_json::to_value(&plan).expect("serialize plan");
        assert_eq!(json["weekStartDate"], "2025-01-05");
        assert_eq!(json["days"][1]["date"], "2025-01-06");
        assert_eq!(json["days"][1]["blocks"][0]["startTime"], "07:00");
        assert_eq!(json["days"][1]["blocks"][0]["kind"], "workout");
        assert_eq!(json["days"][1]["blocks"][0]["isAllDay"], false);
    }

    fn arb_kind() -> impl Strategy<Value = BlockKind> {
        prop_oneof![
            Just(BlockKind::Workout),
            Just(BlockKind::MealEating),
            Just(BlockKind::CalendarEvent),
            Just(BlockKind::Sleep),
        ]
    }

    proptest! {
        #[test]
        fn completion_rate_matches_rounded_ratio(total in 1usize..40, completed_seed in 0usize..40) {
            let completed = completed_seed % (total + 1);
            let blocks = (0..total)
                .map(|index| {
                    let mut candidate = block(&format!("b{index}"), BlockKind::MealEating, "08:00", 30);
                    if index < completed {
                        candidate.status = BlockStatus::Completed;
                    }
                    candidate
                })
                .collect();
            let day = DayPlan::from_blocks(date("2025-01-06"), blocks);
            let expected = (100.0 * completed as f64 / total as f64).round() as u32;
            prop_assert_eq!(day.completion_rate(), expected);
        }

        #[test]
        fn free_minutes_never_underflow(
            durations in proptest::collection::vec(0u32..2000, 0..20),
            waking in 0u32..1440
        ) {
            let blocks = durations
                .iter()
                .enumerate()
                .map(|(index, minutes)| block(&format!("b{index}"), BlockKind::Workout, "07:00", *minutes))
                .collect();
            let day = DayPlan::from_blocks(date("2025-01-06"), blocks);
            let busy: u32 = durations.iter().sum();
            prop_assert_eq!(day.total_free_minutes(waking), waking.saturating_sub(busy));
        }

        #[test]
        fn sorted_days_keep_timed_blocks_in_start_order(
            entries in proptest::collection::vec((0u32..1440, arb_kind(), any::<bool>()), 0..25)
        ) {
            let blocks = entries
                .iter()
                .enumerate()
                .map(|(index, (start, kind, is_all_day))| TimeBlock {
                    is_all_day: *is_all_day,
                    ..block(&format!("b{index}"), *kind, &crate::domain::dates::format_hhmm(*start), 30)
                })
                .collect();
            let day = DayPlan::from_blocks(date("2025-01-06"), blocks);
            let starts = day.timed_blocks().map(|b| b.start_minutes().expect("valid start")).collect::<Vec<_>>();
            prop_assert!(starts.windows(2).all(|pair| pair[0] <= pair[1]));
            let first_timed = day.blocks.iter().position(|b| !b.is_all_day).unwrap_or(day.blocks.len());
            prop_assert!(day.blocks[first_timed..].iter().all(|b| !b.is_all_day));
        }
    }
}
