use chrono::NaiveDate;

/// Length of the run of consecutive posting days ending at the most recent one.
/// Duplicate days and input order do not matter.
pub fn current_streak_days(days: &[NaiveDate]) -> u64 {
    let mut days = days.to_vec();
    days.sort_unstable_by(|a, b| b.cmp(a));
    days.dedup();

    let Some(mut previous) = days.first().copied() else {
        return 0;
    };
    let mut streak = 1;
    for day in days.into_iter().skip(1) {
        if previous.pred_opt() != Some(day) {
            break;
        }
        streak += 1;
        previous = day;
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_no_posts_no_streak() {
        assert_eq!(current_streak_days(&[]), 0);
    }

    #[test]
    fn test_single_day() {
        assert_eq!(current_streak_days(&[day(5)]), 1);
    }

    #[test]
    fn test_consecutive_days_unsorted_with_duplicates() {
        let days = [day(3), day(1), day(2), day(2), day(4)];
        assert_eq!(current_streak_days(&days), 4);
    }

    #[test]
    fn test_gap_ends_the_run() {
        let days = [day(1), day(2), day(3), day(5), day(6)];
        assert_eq!(current_streak_days(&days), 2);
    }

    #[test]
    fn test_run_across_month_boundary() {
        let days = [
            NaiveDate::from_ymd_opt(2024, 2, 28).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            day(1),
        ];
        assert_eq!(current_streak_days(&days), 3);
    }
}
