pub mod models;
pub mod reconcile;
pub mod schedule;
pub mod settle;

pub use models::{ObligationStatus, PaymentObligation, PolicySchedule, PolicyStatus};
pub use reconcile::{ObligationSnapshot, StatusChange, plan_transitions};
pub use schedule::{initial_status, installment_due_date, planned_due_dates};
pub use settle::{SettlementPlan, plan_settlement};
