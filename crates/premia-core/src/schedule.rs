use chrono::{Months, NaiveDate};

use crate::models::ObligationStatus;

/// Due date for the installment at `offset`. The first installment
/// (offset 0) falls one calendar month after the policy start date and
/// each later one advances by whole months from the start date, never
/// chained from the previous due date. Month-end starts clamp
/// (Jan 31 + 1 month = Feb 28/29).
pub fn installment_due_date(start: NaiveDate, offset: u32) -> Option<NaiveDate> {
    start.checked_add_months(Months::new(offset + 1))
}

/// All (offset, due date) pairs for a policy term. A due date equal to
/// the end date is still generated; the first date past it stops the
/// schedule.
pub fn planned_due_dates(start: NaiveDate, end: NaiveDate) -> Vec<(u32, NaiveDate)> {
    let mut schedule = Vec::new();
    let mut offset = 0;
    while let Some(due) = installment_due_date(start, offset) {
        if due > end {
            break;
        }
        schedule.push((offset, due));
        offset += 1;
    }
    schedule
}

/// Status a freshly generated installment starts in: already-elapsed
/// due dates are `Overdue`, the first installment is `Pending` when it
/// is still ahead, everything else waits as `Upcoming`.
pub fn initial_status(offset: u32, due: NaiveDate, today: NaiveDate) -> ObligationStatus {
    if due < today {
        ObligationStatus::Overdue
    } else if offset == 0 {
        ObligationStatus::Pending
    } else {
        ObligationStatus::Upcoming
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn quarterly_term_yields_three_installments() {
        let schedule = planned_due_dates(d(2024, 1, 15), d(2024, 4, 15));
        assert_eq!(
            schedule,
            vec![
                (0, d(2024, 2, 15)),
                (1, d(2024, 3, 15)),
                (2, d(2024, 4, 15)),
            ]
        );
    }

    #[test]
    fn due_date_equal_to_end_date_is_included() {
        let schedule = planned_due_dates(d(2024, 1, 1), d(2024, 2, 1));
        assert_eq!(schedule, vec![(0, d(2024, 2, 1))]);
    }

    #[test]
    fn term_shorter_than_a_month_yields_nothing() {
        assert!(planned_due_dates(d(2024, 1, 15), d(2024, 2, 10)).is_empty());
    }

    #[test]
    fn month_end_start_clamps() {
        assert_eq!(installment_due_date(d(2024, 1, 31), 0), Some(d(2024, 2, 29)));
        assert_eq!(installment_due_date(d(2023, 1, 31), 0), Some(d(2023, 2, 28)));
        // Offsets advance from the start date, so March gets the 31st back.
        assert_eq!(installment_due_date(d(2024, 1, 31), 1), Some(d(2024, 3, 31)));
    }

    #[test]
    fn first_installment_is_pending_when_not_elapsed() {
        let today = d(2024, 1, 20);
        assert_eq!(
            initial_status(0, d(2024, 2, 15), today),
            ObligationStatus::Pending
        );
        assert_eq!(
            initial_status(1, d(2024, 3, 15), today),
            ObligationStatus::Upcoming
        );
    }

    #[test]
    fn elapsed_due_dates_start_overdue_even_at_offset_zero() {
        let today = d(2024, 6, 1);
        assert_eq!(
            initial_status(0, d(2024, 2, 15), today),
            ObligationStatus::Overdue
        );
        assert_eq!(
            initial_status(3, d(2024, 5, 15), today),
            ObligationStatus::Overdue
        );
    }

    #[test]
    fn due_today_is_not_overdue() {
        let today = d(2024, 2, 15);
        assert_eq!(
            initial_status(0, d(2024, 2, 15), today),
            ObligationStatus::Pending
        );
    }
}
