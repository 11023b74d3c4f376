use chrono::NaiveDate;
use premia_core::plan_transitions;
use sqlx::PgPool;
use tracing::debug;

use crate::{error::BillingError, store};

/// Bring every unpaid obligation's status in line with `today`. Safe to
/// run any number of times, including before every read that displays
/// payments; returns how many rows changed.
pub async fn reconcile_statuses(pool: &PgPool, today: NaiveDate) -> Result<u64, BillingError> {
    let snapshots = store::load_unpaid_snapshots(pool).await?;
    let changes = plan_transitions(&snapshots, today);
    if changes.is_empty() {
        return Ok(0);
    }

    let updated = store::apply_status_changes(pool, &changes).await?;
    debug!("reconciled {updated} payment statuses");
    Ok(updated)
}
