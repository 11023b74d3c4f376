use chrono::NaiveDate;
use premia_core::{PolicySchedule, initial_status, planned_due_dates};
use sqlx::PgPool;
use tracing::info;

use crate::{error::BillingError, store};

/// Ensure one obligation exists for every elapsed-or-future month of the
/// policy term. Inserts skip due dates already on file, so calling this
/// twice creates nothing the second time. Returns the number of rows
/// actually created.
pub async fn generate_for_policy(
    pool: &PgPool,
    policy: &PolicySchedule,
    today: NaiveDate,
) -> Result<u32, BillingError> {
    let mut created = 0;

    for (offset, due_date) in planned_due_dates(policy.start_date, policy.end_date) {
        let status = initial_status(offset, due_date, today);
        let inserted = store::insert_scheduled_obligation(
            pool,
            policy.policy_id,
            policy.user_id,
            policy.monthly_premium,
            due_date,
            status,
        )
        .await?;

        if inserted {
            created += 1;
        }
    }

    if created > 0 {
        info!(
            "scheduled {created} payments for policy {}",
            policy.policy_id
        );
    }

    Ok(created)
}
