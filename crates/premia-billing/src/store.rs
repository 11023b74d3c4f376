//! Queries over the `payment_obligations` table and its collaborators.
//! All writes are single statements; callers needing atomicity across
//! several statements open a transaction and use the `*_tx` variants.

use chrono::{Days, NaiveDate, Utc};
use premia_core::{
    ObligationSnapshot, ObligationStatus, PaymentObligation, PolicySchedule, PolicyStatus,
    StatusChange,
};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::BillingError;

fn parse_status(value: &str) -> Result<ObligationStatus, BillingError> {
    ObligationStatus::parse(value).ok_or_else(|| BillingError::UnknownStatus(value.to_string()))
}

fn obligation_from_row(row: &PgRow) -> Result<PaymentObligation, BillingError> {
    let status_raw: String = row.try_get("status")?;

    Ok(PaymentObligation {
        id: row.try_get("id")?,
        policy_id: row.try_get("policy_id")?,
        user_id: row.try_get("user_id")?,
        amount: row.try_get("amount")?,
        due_date: row.try_get("due_date")?,
        payment_date: row.try_get("payment_date")?,
        method: row.try_get("method")?,
        status: parse_status(&status_raw)?,
    })
}

fn schedule_from_row(row: &PgRow) -> Result<PolicySchedule, BillingError> {
    Ok(PolicySchedule {
        policy_id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        monthly_premium: row.try_get("monthly_premium")?,
    })
}

/// Insert one scheduled installment. Returns whether a row was actually
/// created; a clash on (policy_id, due_date) is silently skipped so the
/// generator stays idempotent even across concurrent runs.
pub(crate) async fn insert_scheduled_obligation(
    pool: &PgPool,
    policy_id: Uuid,
    user_id: Uuid,
    amount: Decimal,
    due_date: NaiveDate,
    status: ObligationStatus,
) -> Result<bool, BillingError> {
    let result = sqlx::query(
        r#"
        INSERT INTO payment_obligations (
            id, policy_id, user_id, amount, due_date, status, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
        ON CONFLICT (policy_id, due_date) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(policy_id)
    .bind(user_id)
    .bind(amount.round_dp(2))
    .bind(due_date)
    .bind(status.as_str())
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn insert_obligation_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    policy_id: Uuid,
    user_id: Uuid,
    amount: Decimal,
    due_date: NaiveDate,
    payment_date: Option<NaiveDate>,
    method: Option<&str>,
    status: ObligationStatus,
) -> Result<Uuid, BillingError> {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO payment_obligations (
            id, policy_id, user_id, amount, due_date, payment_date, method, status,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
        "#,
    )
    .bind(id)
    .bind(policy_id)
    .bind(user_id)
    .bind(amount.round_dp(2))
    .bind(due_date)
    .bind(payment_date)
    .bind(method)
    .bind(status.as_str())
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    Ok(id)
}

pub(crate) async fn insert_history_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    payment_id: Uuid,
    policy_id: Uuid,
    user_id: Uuid,
    amount: Decimal,
    status: ObligationStatus,
) -> Result<(), BillingError> {
    sqlx::query(
        r#"
        INSERT INTO payment_history (id, payment_id, policy_id, user_id, amount, status, recorded_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(payment_id)
    .bind(policy_id)
    .bind(user_id)
    .bind(amount.round_dp(2))
    .bind(status.as_str())
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Every unpaid obligation, in the shape the reconciliation planner
/// consumes.
pub(crate) async fn load_unpaid_snapshots(
    pool: &PgPool,
) -> Result<Vec<ObligationSnapshot>, BillingError> {
    let rows = sqlx::query(
        r#"
        SELECT id, policy_id, due_date, status
        FROM payment_obligations
        WHERE payment_date IS NULL
        ORDER BY policy_id, due_date
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut snapshots = Vec::with_capacity(rows.len());
    for row in rows {
        let status_raw: String = row.try_get("status")?;
        snapshots.push(ObligationSnapshot {
            id: row.try_get("id")?,
            policy_id: row.try_get("policy_id")?,
            due_date: row.try_get("due_date")?,
            status: parse_status(&status_raw)?,
        });
    }

    Ok(snapshots)
}

pub(crate) async fn apply_status_changes(
    pool: &PgPool,
    changes: &[StatusChange],
) -> Result<u64, BillingError> {
    let mut updated = 0;
    for change in changes {
        let result = sqlx::query(
            "UPDATE payment_obligations SET status = $2, updated_at = $3 WHERE id = $1 AND payment_date IS NULL",
        )
        .bind(change.id)
        .bind(change.status.as_str())
        .bind(Utc::now())
        .execute(pool)
        .await?;
        updated += result.rows_affected();
    }

    Ok(updated)
}

/// Full payment history for one policy, newest obligations first.
pub async fn list_for_policy(
    pool: &PgPool,
    policy_id: Uuid,
) -> Result<Vec<PaymentObligation>, BillingError> {
    let rows = sqlx::query(
        r#"
        SELECT id, policy_id, user_id, amount, due_date, payment_date, method, status
        FROM payment_obligations
        WHERE policy_id = $1
        ORDER BY due_date DESC, payment_date DESC NULLS LAST
        "#,
    )
    .bind(policy_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(obligation_from_row).collect()
}

/// One policy's payment history restricted to its owner; rows for a
/// different user come back empty rather than leaking.
pub async fn list_for_policy_user(
    pool: &PgPool,
    policy_id: Uuid,
    user_id: Uuid,
) -> Result<Vec<PaymentObligation>, BillingError> {
    let rows = sqlx::query(
        r#"
        SELECT id, policy_id, user_id, amount, due_date, payment_date, method, status
        FROM payment_obligations
        WHERE policy_id = $1 AND user_id = $2
        ORDER BY due_date DESC, payment_date DESC NULLS LAST
        "#,
    )
    .bind(policy_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(obligation_from_row).collect()
}

/// The one obligation a policy's owner should pay next, if any. After
/// reconciliation at most one unpaid row per policy is Pending.
pub async fn next_pending_for_policy(
    pool: &PgPool,
    policy_id: Uuid,
) -> Result<Option<PaymentObligation>, BillingError> {
    let row = sqlx::query(
        r#"
        SELECT id, policy_id, user_id, amount, due_date, payment_date, method, status
        FROM payment_obligations
        WHERE policy_id = $1
          AND status = 'Pending'
          AND payment_date IS NULL
        ORDER BY due_date ASC
        LIMIT 1
        "#,
    )
    .bind(policy_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(obligation_from_row(&row)?)),
        None => Ok(None),
    }
}

/// Dashboard view of a user's payments: each policy's next Pending
/// installment plus anything completed in the last 30 days. Overdue
/// rows are hidden unless asked for, in which case they sort first.
pub async fn relevant_for_user(
    pool: &PgPool,
    user_id: Uuid,
    today: NaiveDate,
    include_overdue: bool,
) -> Result<Vec<PaymentObligation>, BillingError> {
    let recent_cutoff = recent_window_start(today);

    let sql = if include_overdue {
        r#"
        SELECT id, policy_id, user_id, amount, due_date, payment_date, method, status
        FROM payment_obligations
        WHERE user_id = $1
          AND (
            (status = 'Pending' AND payment_date IS NULL)
            OR status = 'Overdue'
            OR (status = 'Completed' AND payment_date >= $2)
          )
        ORDER BY
            CASE status
                WHEN 'Overdue' THEN 1
                WHEN 'Pending' THEN 2
                ELSE 3
            END,
            due_date ASC,
            payment_date DESC NULLS LAST
        "#
    } else {
        r#"
        SELECT id, policy_id, user_id, amount, due_date, payment_date, method, status
        FROM payment_obligations
        WHERE user_id = $1
          AND status != 'Overdue'
          AND (
            (status = 'Pending' AND payment_date IS NULL)
            OR (status = 'Completed' AND payment_date >= $2)
          )
        ORDER BY
            CASE status WHEN 'Pending' THEN 1 ELSE 2 END,
            due_date ASC,
            payment_date DESC NULLS LAST
        "#
    };

    let rows = sqlx::query(sql)
        .bind(user_id)
        .bind(recent_cutoff)
        .fetch_all(pool)
        .await?;

    rows.iter().map(obligation_from_row).collect()
}

/// All of a user's obligations in display order: the next Pending
/// payment first, then recently Completed ones, then Upcoming and
/// Overdue.
pub async fn list_for_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Vec<PaymentObligation>, BillingError> {
    let rows = sqlx::query(
        r#"
        SELECT id, policy_id, user_id, amount, due_date, payment_date, method, status
        FROM payment_obligations
        WHERE user_id = $1
        ORDER BY
            CASE status
                WHEN 'Pending' THEN 1
                WHEN 'Completed' THEN 2
                WHEN 'Upcoming' THEN 3
                WHEN 'Overdue' THEN 4
                ELSE 5
            END,
            due_date ASC,
            payment_date DESC NULLS LAST
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(obligation_from_row).collect()
}

/// The obligations a payment can currently be applied to, most urgent
/// first.
pub async fn payable_for_policy(
    pool: &PgPool,
    policy_id: Uuid,
) -> Result<Vec<PaymentObligation>, BillingError> {
    let rows = sqlx::query(
        r#"
        SELECT id, policy_id, user_id, amount, due_date, payment_date, method, status
        FROM payment_obligations
        WHERE policy_id = $1
          AND payment_date IS NULL
          AND status IN ('Pending', 'Overdue', 'Partially Paid')
        ORDER BY
            CASE status
                WHEN 'Overdue' THEN 1
                WHEN 'Partially Paid' THEN 2
                WHEN 'Pending' THEN 3
                ELSE 4
            END,
            due_date ASC
        "#,
    )
    .bind(policy_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(obligation_from_row).collect()
}

/// Sum and count of Completed payments whose payment date falls inside
/// the given month. `None` when year/month do not name a real month.
pub async fn monthly_revenue(
    pool: &PgPool,
    year: i32,
    month: u32,
) -> Result<Option<(Decimal, i64)>, BillingError> {
    let Some((from, to)) = month_bounds(year, month) else {
        return Ok(None);
    };

    let row = sqlx::query(
        r#"
        SELECT COALESCE(SUM(amount), 0) AS total_revenue, COUNT(*) AS payments_count
        FROM payment_obligations
        WHERE status = 'Completed'
          AND payment_date >= $1
          AND payment_date < $2
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_one(pool)
    .await?;

    Ok(Some((
        row.try_get("total_revenue")?,
        row.try_get("payments_count")?,
    )))
}

/// Completed payments stay on the dashboard for 30 days.
fn recent_window_start(today: NaiveDate) -> NaiveDate {
    today - Days::new(30)
}

fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let from = NaiveDate::from_ymd_opt(year, month, 1)?;
    let to = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((from, to))
}

/// Active policies whose term has not yet run out, oldest first — the
/// batch generator's work list.
pub(crate) async fn active_policy_schedules(
    pool: &PgPool,
    today: NaiveDate,
) -> Result<Vec<PolicySchedule>, BillingError> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, start_date, end_date, monthly_premium
        FROM policies
        WHERE status = $1 AND end_date >= $2
        ORDER BY start_date ASC
        "#,
    )
    .bind(PolicyStatus::Active.as_str())
    .bind(today)
    .fetch_all(pool)
    .await?;

    rows.iter().map(schedule_from_row).collect()
}

pub(crate) async fn policy_schedule_by_id(
    pool: &PgPool,
    policy_id: Uuid,
) -> Result<Option<(PolicySchedule, String)>, BillingError> {
    let row = sqlx::query(
        r#"
        SELECT id, user_id, status, start_date, end_date, monthly_premium
        FROM policies
        WHERE id = $1
        "#,
    )
    .bind(policy_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let status: String = row.try_get("status")?;
            Ok(Some((schedule_from_row(&row)?, status)))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_bounds_cover_the_whole_month() {
        let (from, to) = month_bounds(2024, 2).unwrap();
        assert_eq!(from, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(to, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn month_bounds_roll_over_december() {
        let (from, to) = month_bounds(2024, 12).unwrap();
        assert_eq!(from, NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
        assert_eq!(to, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    }

    #[test]
    fn month_bounds_reject_nonsense() {
        assert!(month_bounds(2024, 0).is_none());
        assert!(month_bounds(2024, 13).is_none());
    }

    #[test]
    fn recent_window_spans_thirty_days_across_month_ends() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(
            recent_window_start(today),
            NaiveDate::from_ymd_opt(2024, 2, 14).unwrap()
        );
    }
}
