use crate::domain::dates::CalendarDate;
use chrono::Duration;
use serde::Serialize;

/// The date the daily view is showing. Always one of the active week's
/// seven dates.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    selected_date: CalendarDate,
}

impl SelectionState {
    pub fn new(initial: CalendarDate) -> Self {
        Self {
            selected_date: initial,
        }
    }

    pub fn selected(&self) -> CalendarDate {
        self.selected_date
    }

    /// Selects `date`, clamped into `[week_start, week_start + 6]`.
    pub fn select(&mut self, week_start: CalendarDate, date: CalendarDate) -> CalendarDate {
        let week_end = week_start + Duration::days(6);
        self.selected_date = date.clamp(week_start, week_end);
        self.selected_date
    }

    /// Today when it falls in the active week, otherwise the nearest edge.
    pub fn jump_to_today(&mut self, week_start: CalendarDate, today: CalendarDate) -> CalendarDate {
        self.select(week_start, today)
    }

    /// Re-clamps after the active week changed underneath the selection.
    pub fn follow_week(&mut self, week_start: CalendarDate) -> CalendarDate {
        self.select(week_start, self.selected_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::date;
    use proptest::prelude::*;

    #[test]
    fn select_keeps_in_week_dates() {
        let mut selection = SelectionState::new(date("2025-01-05"));
        assert_eq!(selection.select(date("2025-01-05"), date("2025-01-09")), date("2025-01-09"));
    }

    #[test]
    fn jump_to_today_snaps_to_nearest_edge() {
        let week = date("2025-01-05");
        let mut selection = SelectionState::new(week);
        assert_eq!(selection.jump_to_today(week, date("2025-02-20")), date("2025-01-11"));
        assert_eq!(selection.jump_to_today(week, date("2024-12-25")), date("2025-01-05"));
        assert_eq!(selection.jump_to_today(week, date("2025-01-07")), date("2025-01-07"));
    }

    #[test]
    fn follow_week_moves_selection_into_new_week() {
        let mut selection = SelectionState::new(date("2025-01-08"));
        assert_eq!(selection.follow_week(date("2025-01-12")), date("2025-01-12"));
    }

    proptest! {
        #[test]
        fn selection_always_lands_in_active_week(week_offset in -200i64..200, day_offset in -400i64..400) {
            let week_start = date("2025-01-05") + Duration::weeks(week_offset);
            let mut selection = SelectionState::new(week_start);
            let selected = selection.select(week_start, week_start + Duration::days(day_offset));
            prop_assert!(selected >= week_start);
            prop_assert!(selected <= week_start + Duration::days(6));
        }
    }
}
