use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;

use crate::models::ObligationStatus;

/// Outcome of applying a payment to an obligation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementPlan {
    /// Paid in full. Overpayment is accepted as-is; the stored amount is
    /// left unchanged and no credit is issued.
    Full,
    /// Paid short. The original row keeps only the paid portion and a
    /// new obligation carries the balance, due the day after the
    /// original due date.
    Partial {
        paid_portion: Decimal,
        remainder: Decimal,
        remainder_due: NaiveDate,
        remainder_status: ObligationStatus,
    },
}

/// Decide how a payment of `paid` settles an obligation currently worth
/// `outstanding`. The remainder of a short payment is due one day after
/// the original due date regardless of its size; when the original due
/// date has already elapsed the remainder starts out Overdue, otherwise
/// it becomes the policy's next Pending installment.
pub fn plan_settlement(
    outstanding: Decimal,
    paid: Decimal,
    due_date: NaiveDate,
    today: NaiveDate,
) -> SettlementPlan {
    if paid >= outstanding {
        return SettlementPlan::Full;
    }

    let remainder_status = if due_date < today {
        ObligationStatus::Overdue
    } else {
        ObligationStatus::Pending
    };

    SettlementPlan::Partial {
        paid_portion: paid,
        remainder: outstanding - paid,
        remainder_due: due_date + Days::new(1),
        remainder_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn dec(value: i64) -> Decimal {
        Decimal::new(value, 0)
    }

    #[test]
    fn exact_payment_settles_in_full() {
        let plan = plan_settlement(dec(100), dec(100), d(2024, 2, 15), d(2024, 2, 10));
        assert_eq!(plan, SettlementPlan::Full);
    }

    #[test]
    fn overpayment_is_accepted_without_a_credit() {
        let plan = plan_settlement(dec(100), dec(150), d(2024, 2, 15), d(2024, 2, 10));
        assert_eq!(plan, SettlementPlan::Full);
    }

    #[test]
    fn short_payment_after_due_date_leaves_an_overdue_remainder() {
        let plan = plan_settlement(dec(100), dec(60), d(2024, 2, 15), d(2024, 3, 1));
        assert_eq!(
            plan,
            SettlementPlan::Partial {
                paid_portion: dec(60),
                remainder: dec(40),
                remainder_due: d(2024, 2, 16),
                remainder_status: ObligationStatus::Overdue,
            }
        );
    }

    #[test]
    fn short_payment_before_due_date_leaves_a_pending_remainder() {
        let plan = plan_settlement(dec(100), dec(25), d(2024, 2, 15), d(2024, 2, 1));
        assert_eq!(
            plan,
            SettlementPlan::Partial {
                paid_portion: dec(25),
                remainder: dec(75),
                remainder_due: d(2024, 2, 16),
                remainder_status: ObligationStatus::Pending,
            }
        );
    }

    #[test]
    fn short_payment_on_the_due_date_itself_stays_pending() {
        let due = d(2024, 2, 15);
        let plan = plan_settlement(dec(100), dec(60), due, due);
        match plan {
            SettlementPlan::Partial {
                remainder_status, ..
            } => assert_eq!(remainder_status, ObligationStatus::Pending),
            other => panic!("expected partial plan, got {other:?}"),
        }
    }

    #[test]
    fn split_conserves_the_original_amount() {
        let outstanding = Decimal::new(12345, 2); // 123.45
        let paid = Decimal::new(6789, 2); // 67.89
        match plan_settlement(outstanding, paid, d(2024, 2, 15), d(2024, 2, 1)) {
            SettlementPlan::Partial {
                paid_portion,
                remainder,
                ..
            } => assert_eq!(paid_portion + remainder, outstanding),
            other => panic!("expected partial plan, got {other:?}"),
        }
    }
}
