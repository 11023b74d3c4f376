//! Payment scheduling and settlement engine: generates monthly premium
//! obligations for active policies, reconciles their statuses against
//! the current date, and records full or partial payments.

pub mod error;
pub mod generator;
pub mod reconciler;
pub mod recorder;
pub mod scheduler;
pub mod store;

pub use error::BillingError;
pub use generator::generate_for_policy;
pub use reconciler::reconcile_statuses;
pub use recorder::{NewPayment, PaymentEvent, mark_obligation_paid, record_new_payment};
pub use scheduler::{
    BatchOutcome, PolicyFailure, generate_for_all_active, generate_for_policy_id,
};

use sqlx::PgPool;

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
