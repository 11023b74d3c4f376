use chrono::{NaiveDate, Utc};
use premia_core::{ObligationStatus, SettlementPlan, plan_settlement};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::{error::BillingError, reconciler::reconcile_statuses, store};

/// An ad hoc payment recorded outside the generated schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub payment_date: Option<NaiveDate>,
    pub method: Option<String>,
    pub status: Option<ObligationStatus>,
}

/// A payment event applied to an existing obligation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub method: String,
}

/// Insert a standalone obligation, bypassing the schedule. Defaults to
/// `Completed` for manual payments that already happened; callers may
/// override the status. Returns the new obligation id.
pub async fn record_new_payment(
    pool: &PgPool,
    policy_id: Uuid,
    user_id: Uuid,
    payment: &NewPayment,
    today: NaiveDate,
) -> Result<Uuid, BillingError> {
    let status = payment.status.unwrap_or(ObligationStatus::Completed);

    let mut tx = pool.begin().await?;
    let obligation_id = store::insert_obligation_tx(
        &mut tx,
        policy_id,
        user_id,
        payment.amount,
        payment.due_date,
        payment.payment_date,
        payment.method.as_deref(),
        status,
    )
    .await?;
    store::insert_history_tx(&mut tx, obligation_id, policy_id, user_id, payment.amount, status)
        .await?;
    tx.commit().await?;

    reconcile_statuses(pool, today).await?;

    Ok(obligation_id)
}

/// Apply a real payment to an existing obligation.
///
/// Pays in full when the amount covers the outstanding balance
/// (overpayment is accepted, not refunded). A short payment splits the
/// row: the original keeps the paid portion as `Partially Paid` and a
/// new obligation carries the balance, due the day after.
///
/// Returns `false` without touching anything when the obligation is not
/// in a payable status — re-paying a `Completed` row is a no-op the
/// caller can detect.
pub async fn mark_obligation_paid(
    pool: &PgPool,
    obligation_id: Uuid,
    payment: &PaymentEvent,
    today: NaiveDate,
) -> Result<bool, BillingError> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        r#"
        SELECT policy_id, user_id, amount, due_date, status
        FROM payment_obligations
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(obligation_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = row else {
        return Err(BillingError::ObligationNotFound(obligation_id));
    };

    let policy_id: Uuid = row.try_get("policy_id")?;
    let user_id: Uuid = row.try_get("user_id")?;
    let outstanding: Decimal = row.try_get("amount")?;
    let due_date: NaiveDate = row.try_get("due_date")?;
    let status_raw: String = row.try_get("status")?;
    let status = ObligationStatus::parse(&status_raw)
        .ok_or_else(|| BillingError::UnknownStatus(status_raw.clone()))?;

    if !status.is_payable() {
        return Ok(false);
    }

    let settled_status = match plan_settlement(outstanding, payment.amount, due_date, today) {
        SettlementPlan::Full => {
            let result = sqlx::query(
                r#"
                UPDATE payment_obligations
                SET status = $2, payment_date = $3, method = $4, updated_at = $5
                WHERE id = $1 AND status IN ('Pending', 'Overdue', 'Partially Paid')
                "#,
            )
            .bind(obligation_id)
            .bind(ObligationStatus::Completed.as_str())
            .bind(payment.payment_date)
            .bind(&payment.method)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Ok(false);
            }

            ObligationStatus::Completed
        }
        SettlementPlan::Partial {
            paid_portion,
            remainder,
            remainder_due,
            remainder_status,
        } => {
            let result = sqlx::query(
                r#"
                UPDATE payment_obligations
                SET status = $2, amount = $3, payment_date = $4, method = $5, updated_at = $6
                WHERE id = $1 AND status IN ('Pending', 'Overdue', 'Partially Paid')
                "#,
            )
            .bind(obligation_id)
            .bind(ObligationStatus::PartiallyPaid.as_str())
            .bind(paid_portion.round_dp(2))
            .bind(payment.payment_date)
            .bind(&payment.method)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Ok(false);
            }

            let remainder_id = store::insert_obligation_tx(
                &mut tx,
                policy_id,
                user_id,
                remainder,
                remainder_due,
                None,
                None,
                remainder_status,
            )
            .await?;
            info!(
                "payment of {} fell short of {outstanding}; remainder {remainder} due {remainder_due} as obligation {remainder_id}",
                payment.amount
            );

            ObligationStatus::PartiallyPaid
        }
    };

    store::insert_history_tx(
        &mut tx,
        obligation_id,
        policy_id,
        user_id,
        payment.amount,
        settled_status,
    )
    .await?;
    tx.commit().await?;

    // Restore the one-Pending-per-policy invariant after the split.
    reconcile_statuses(pool, today).await?;

    Ok(true)
}
