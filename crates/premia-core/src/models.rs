use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a single payment obligation. At most one unpaid obligation
/// per policy holds `Pending` at a time; `Completed` and `PartiallyPaid`
/// are reached only through an explicit payment action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObligationStatus {
    Pending,
    Upcoming,
    Overdue,
    #[serde(rename = "Partially Paid")]
    PartiallyPaid,
    Completed,
}

impl ObligationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObligationStatus::Pending => "Pending",
            ObligationStatus::Upcoming => "Upcoming",
            ObligationStatus::Overdue => "Overdue",
            ObligationStatus::PartiallyPaid => "Partially Paid",
            ObligationStatus::Completed => "Completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Pending" => Some(ObligationStatus::Pending),
            "Upcoming" => Some(ObligationStatus::Upcoming),
            "Overdue" => Some(ObligationStatus::Overdue),
            "Partially Paid" => Some(ObligationStatus::PartiallyPaid),
            "Completed" => Some(ObligationStatus::Completed),
            _ => None,
        }
    }

    /// Whether a payment can still be applied to this obligation.
    pub fn is_payable(&self) -> bool {
        matches!(
            self,
            ObligationStatus::Pending
                | ObligationStatus::Overdue
                | ObligationStatus::PartiallyPaid
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyStatus {
    Pending,
    Active,
    Cancelled,
    Expired,
}

impl PolicyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyStatus::Pending => "PENDING",
            PolicyStatus::Active => "ACTIVE",
            PolicyStatus::Cancelled => "CANCELLED",
            PolicyStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(PolicyStatus::Pending),
            "ACTIVE" => Some(PolicyStatus::Active),
            "CANCELLED" => Some(PolicyStatus::Cancelled),
            "EXPIRED" => Some(PolicyStatus::Expired),
            _ => None,
        }
    }
}

/// One scheduled or realized payment record tied to a policy and due date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentObligation {
    pub id: Uuid,
    pub policy_id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,
    pub method: Option<String>,
    pub status: ObligationStatus,
}

/// The slice of a policy the payment generator needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySchedule {
    pub policy_id: Uuid,
    pub user_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub monthly_premium: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            ObligationStatus::Pending,
            ObligationStatus::Upcoming,
            ObligationStatus::Overdue,
            ObligationStatus::PartiallyPaid,
            ObligationStatus::Completed,
        ] {
            assert_eq!(ObligationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ObligationStatus::parse("Refunded"), None);
    }

    #[test]
    fn payable_statuses() {
        assert!(ObligationStatus::Pending.is_payable());
        assert!(ObligationStatus::Overdue.is_payable());
        assert!(ObligationStatus::PartiallyPaid.is_payable());
        assert!(!ObligationStatus::Upcoming.is_payable());
        assert!(!ObligationStatus::Completed.is_payable());
    }

    #[test]
    fn policy_status_parse_is_case_insensitive() {
        assert_eq!(PolicyStatus::parse("active"), Some(PolicyStatus::Active));
        assert_eq!(PolicyStatus::parse(" PENDING "), Some(PolicyStatus::Pending));
        assert_eq!(PolicyStatus::parse("VOID"), None);
    }
}
