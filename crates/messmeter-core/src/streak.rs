use chrono::NaiveDate;

/// Streak milestones fire at every positive multiple of this many days.
pub const MILESTONE_INTERVAL: u32 = 7;

/// The streak fields carried on a user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreakState {
    pub streak_days: u32,
    pub best_streak: u32,
    pub last_attendance_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakUpdate {
    pub state: StreakState,
    /// False when the date was already counted (second meal the same day).
    pub advanced: bool,
    /// Set to the new streak length when it just hit a milestone.
    pub milestone: Option<u32>,
}

/// Roll the streak forward for an attendance on `date`.
///
/// Same date as the last counted attendance: no change (a second meal on the
/// same day must not double-increment). Consecutive day: +1. Anything else,
/// including first-ever attendance: reset to 1.
pub fn advance(state: StreakState, date: NaiveDate) -> StreakUpdate {
    if state.last_attendance_date == Some(date) {
        return StreakUpdate {
            state,
            advanced: false,
            milestone: None,
        };
    }

    let streak_days = match state.last_attendance_date {
        Some(prev) if prev.succ_opt() == Some(date) => state.streak_days + 1,
        _ => 1,
    };

    StreakUpdate {
        state: StreakState {
            streak_days,
            best_streak: state.best_streak.max(streak_days),
            last_attendance_date: Some(date),
        },
        advanced: true,
        milestone: (streak_days % MILESTONE_INTERVAL == 0).then_some(streak_days),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    #[test]
    fn first_attendance_starts_at_one() {
        let update = advance(StreakState::default(), day(10));
        assert!(update.advanced);
        assert_eq!(update.state.streak_days, 1);
        assert_eq!(update.state.best_streak, 1);
        assert_eq!(update.state.last_attendance_date, Some(day(10)));
        assert_eq!(update.milestone, None);
    }

    #[test]
    fn consecutive_days_increment() {
        let mut state = StreakState::default();
        state = advance(state, day(10)).state;
        state = advance(state, day(11)).state;
        assert_eq!(state.streak_days, 2);
        assert_eq!(state.best_streak, 2);
    }

    #[test]
    fn gap_resets_to_one_but_keeps_best() {
        let mut state = StreakState::default();
        state = advance(state, day(10)).state;
        state = advance(state, day(11)).state;
        state = advance(state, day(14)).state; // gap of 2+ days
        assert_eq!(state.streak_days, 1);
        assert_eq!(state.best_streak, 2);
    }

    #[test]
    fn second_meal_same_day_is_a_no_op() {
        let mut state = StreakState::default();
        state = advance(state, day(10)).state;
        let update = advance(state, day(10));
        assert!(!update.advanced);
        assert_eq!(update.state, state);
        assert_eq!(update.milestone, None);
    }

    #[test]
    fn milestone_fires_at_multiples_of_seven() {
        let mut state = StreakState::default();
        for d in 1..=6 {
            let update = advance(state, day(d));
            assert_eq!(update.milestone, None);
            state = update.state;
        }
        let update = advance(state, day(7));
        assert_eq!(update.milestone, Some(7));
        assert_eq!(update.state.streak_days, 7);

        // Re-running the same day does not re-fire the milestone
        let rerun = advance(update.state, day(7));
        assert_eq!(rerun.milestone, None);
    }

    #[test]
    fn milestone_fires_again_at_fourteen() {
        let mut state = StreakState::default();
        let mut milestones = Vec::new();
        for d in 1..=14 {
            let update = advance(state, day(d));
            if let Some(m) = update.milestone {
                milestones.push(m);
            }
            state = update.state;
        }
        assert_eq!(milestones, vec![7, 14]);
    }
}
