use std::net::SocketAddr;

use anyhow::Result as AnyResult;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{NaiveDate, Utc};
use premia_billing::{
    BatchOutcome, BillingError, NewPayment, PaymentEvent, generate_for_policy_id,
    mark_obligation_paid, reconcile_statuses, record_new_payment, store,
};
use premia_core::{ObligationStatus, PaymentObligation, PolicyStatus};
use premia_platform::{EventBus, PolicyActivatedEvent, ServiceConfig, connect_database};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::{error, info};
use uuid::Uuid;

#[derive(Clone)]
struct AppState {
    pool: PgPool,
    bus: EventBus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReconcileResponse {
    updated: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeneratePaymentsResponse {
    policy_id: Uuid,
    payments_created: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApprovePolicyResponse {
    policy_id: Uuid,
    status: String,
    payments_created: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordPaymentRequest {
    amount: Decimal,
    due_date: NaiveDate,
    payment_date: Option<NaiveDate>,
    method: Option<String>,
    status: Option<ObligationStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordPaymentResponse {
    payment_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MarkPaidRequest {
    amount: Decimal,
    payment_date: NaiveDate,
    method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MarkPaidResponse {
    payment_id: Uuid,
    success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PaymentListResponse {
    items: Vec<PaymentObligation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NextPaymentResponse {
    item: Option<PaymentObligation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PolicyPaymentsQuery {
    user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RelevantPaymentsQuery {
    include_overdue: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RevenueQuery {
    year: i32,
    month: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RevenueReportResponse {
    year: i32,
    month: u32,
    total_revenue: Decimal,
    payments_count: i64,
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "premia_gateway=info".to_string()),
        )
        .init();

    let config = ServiceConfig::from_env()?;
    let pool = connect_database(&config).await?;
    premia_billing::run_migrations(&pool).await?;
    let bus = EventBus::connect(&config.redis_url)?;

    let state = AppState { pool, bus };
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/admin/payments/generate", post(generate_all_payments))
        .route("/admin/payments/reconcile", post(reconcile_payments))
        .route("/admin/reports/revenue", get(revenue_report))
        .route(
            "/policies/{policy_id}/payments",
            get(list_policy_payments).post(record_payment),
        )
        .route(
            "/policies/{policy_id}/payments/generate",
            post(generate_policy_payments),
        )
        .route(
            "/policies/{policy_id}/payments/payable",
            get(list_payable_payments),
        )
        .route(
            "/policies/{policy_id}/payments/next",
            get(next_policy_payment),
        )
        .route("/policies/{policy_id}/approve", post(approve_policy))
        .route("/payments/{payment_id}/pay", post(pay_obligation))
        .route("/users/{user_id}/payments", get(list_user_payments))
        .route(
            "/users/{user_id}/payments/relevant",
            get(list_relevant_payments),
        )
        .with_state(state);

    let addr: SocketAddr = ServiceConfig::http_addr("0.0.0.0:8080").parse()?;
    info!("gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn generate_all_payments(
    State(state): State<AppState>,
) -> Result<Json<BatchOutcome>, (StatusCode, String)> {
    let today = Utc::now().date_naive();
    let outcome = premia_billing::generate_for_all_active(&state.pool, today)
        .await
        .map_err(billing_error)?;

    info!(
        "batch generation processed {} policies, created {} payments, {} failures",
        outcome.policies_processed,
        outcome.payments_created,
        outcome.errors.len()
    );

    Ok(Json(outcome))
}

async fn reconcile_payments(
    State(state): State<AppState>,
) -> Result<Json<ReconcileResponse>, (StatusCode, String)> {
    let today = Utc::now().date_naive();
    let updated = reconcile_statuses(&state.pool, today)
        .await
        .map_err(billing_error)?;

    Ok(Json(ReconcileResponse { updated }))
}

async fn generate_policy_payments(
    State(state): State<AppState>,
    Path(policy_id): Path<Uuid>,
) -> Result<Json<GeneratePaymentsResponse>, (StatusCode, String)> {
    let today = Utc::now().date_naive();
    let payments_created = generate_for_policy_id(&state.pool, policy_id, today)
        .await
        .map_err(billing_error)?;

    Ok(Json(GeneratePaymentsResponse {
        policy_id,
        payments_created,
    }))
}

async fn approve_policy(
    State(state): State<AppState>,
    Path(policy_id): Path<Uuid>,
) -> Result<Json<ApprovePolicyResponse>, (StatusCode, String)> {
    let now = Utc::now();

    let mut tx = state.pool.begin().await.map_err(internal_error)?;
    let row = sqlx::query("SELECT user_id, status FROM policies WHERE id = $1 FOR UPDATE")
        .bind(policy_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(internal_error)?;

    let Some(row) = row else {
        return Err((StatusCode::NOT_FOUND, "policy not found".to_string()));
    };

    let user_id: Uuid = row.try_get("user_id").map_err(internal_error)?;
    let status_raw: String = row.try_get("status").map_err(internal_error)?;
    if PolicyStatus::parse(&status_raw) != Some(PolicyStatus::Pending) {
        return Err((
            StatusCode::CONFLICT,
            format!("policy is {status_raw}, not awaiting approval"),
        ));
    }

    sqlx::query("UPDATE policies SET status = $2, updated_at = $3 WHERE id = $1")
        .bind(policy_id)
        .bind(PolicyStatus::Active.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(internal_error)?;
    tx.commit().await.map_err(internal_error)?;

    // The schedule exists before the approval response goes out; the
    // event lets other services react without polling.
    let payments_created = generate_for_policy_id(&state.pool, policy_id, now.date_naive())
        .await
        .map_err(billing_error)?;

    let event = PolicyActivatedEvent {
        policy_id,
        user_id,
        activated_at: now,
    };
    if let Err(err) = state.bus.publish_policy_activated(&event).await {
        error!("failed to publish policy activation for {policy_id}: {err:#}");
    }

    Ok(Json(ApprovePolicyResponse {
        policy_id,
        status: PolicyStatus::Active.as_str().to_string(),
        payments_created,
    }))
}

async fn record_payment(
    State(state): State<AppState>,
    Path(policy_id): Path<Uuid>,
    Json(payload): Json<RecordPaymentRequest>,
) -> Result<Json<RecordPaymentResponse>, (StatusCode, String)> {
    if payload.amount <= Decimal::ZERO {
        return Err((
            StatusCode::BAD_REQUEST,
            "amount must be positive".to_string(),
        ));
    }

    let owner = sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM policies WHERE id = $1")
        .bind(policy_id)
        .fetch_optional(&state.pool)
        .await
        .map_err(internal_error)?;

    let Some(user_id) = owner else {
        return Err((StatusCode::NOT_FOUND, "policy not found".to_string()));
    };

    let payment = NewPayment {
        amount: payload.amount,
        due_date: payload.due_date,
        payment_date: payload.payment_date,
        method: payload.method,
        status: payload.status,
    };
    let today = Utc::now().date_naive();
    let payment_id = record_new_payment(&state.pool, policy_id, user_id, &payment, today)
        .await
        .map_err(billing_error)?;

    Ok(Json(RecordPaymentResponse { payment_id }))
}

async fn pay_obligation(
    State(state): State<AppState>,
    Path(payment_id): Path<Uuid>,
    Json(payload): Json<MarkPaidRequest>,
) -> Result<Json<MarkPaidResponse>, (StatusCode, String)> {
    if payload.amount <= Decimal::ZERO {
        return Err((
            StatusCode::BAD_REQUEST,
            "amount must be positive".to_string(),
        ));
    }

    let event = PaymentEvent {
        amount: payload.amount,
        payment_date: payload.payment_date,
        method: payload.method,
    };
    let today = Utc::now().date_naive();
    let success = mark_obligation_paid(&state.pool, payment_id, &event, today)
        .await
        .map_err(billing_error)?;

    Ok(Json(MarkPaidResponse {
        payment_id,
        success,
    }))
}

async fn list_policy_payments(
    State(state): State<AppState>,
    Path(policy_id): Path<Uuid>,
    Query(query): Query<PolicyPaymentsQuery>,
) -> Result<Json<PaymentListResponse>, (StatusCode, String)> {
    let today = Utc::now().date_naive();
    reconcile_statuses(&state.pool, today)
        .await
        .map_err(billing_error)?;

    let items = match query.user_id {
        Some(user_id) => store::list_for_policy_user(&state.pool, policy_id, user_id)
            .await
            .map_err(billing_error)?,
        None => store::list_for_policy(&state.pool, policy_id)
            .await
            .map_err(billing_error)?,
    };

    Ok(Json(PaymentListResponse { items }))
}

async fn next_policy_payment(
    State(state): State<AppState>,
    Path(policy_id): Path<Uuid>,
) -> Result<Json<NextPaymentResponse>, (StatusCode, String)> {
    let today = Utc::now().date_naive();
    reconcile_statuses(&state.pool, today)
        .await
        .map_err(billing_error)?;

    let item = store::next_pending_for_policy(&state.pool, policy_id)
        .await
        .map_err(billing_error)?;

    Ok(Json(NextPaymentResponse { item }))
}

async fn list_payable_payments(
    State(state): State<AppState>,
    Path(policy_id): Path<Uuid>,
) -> Result<Json<PaymentListResponse>, (StatusCode, String)> {
    let today = Utc::now().date_naive();
    reconcile_statuses(&state.pool, today)
        .await
        .map_err(billing_error)?;

    let items = store::payable_for_policy(&state.pool, policy_id)
        .await
        .map_err(billing_error)?;

    Ok(Json(PaymentListResponse { items }))
}

async fn list_user_payments(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<PaymentListResponse>, (StatusCode, String)> {
    let today = Utc::now().date_naive();
    reconcile_statuses(&state.pool, today)
        .await
        .map_err(billing_error)?;

    let items = store::list_for_user(&state.pool, user_id)
        .await
        .map_err(billing_error)?;

    Ok(Json(PaymentListResponse { items }))
}

async fn list_relevant_payments(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<RelevantPaymentsQuery>,
) -> Result<Json<PaymentListResponse>, (StatusCode, String)> {
    let today = Utc::now().date_naive();
    reconcile_statuses(&state.pool, today)
        .await
        .map_err(billing_error)?;

    let include_overdue = query.include_overdue.unwrap_or(false);
    let items = store::relevant_for_user(&state.pool, user_id, today, include_overdue)
        .await
        .map_err(billing_error)?;

    Ok(Json(PaymentListResponse { items }))
}

async fn revenue_report(
    State(state): State<AppState>,
    Query(query): Query<RevenueQuery>,
) -> Result<Json<RevenueReportResponse>, (StatusCode, String)> {
    let report = store::monthly_revenue(&state.pool, query.year, query.month)
        .await
        .map_err(billing_error)?;

    let Some((total_revenue, payments_count)) = report else {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("{}-{} is not a valid month", query.year, query.month),
        ));
    };

    Ok(Json(RevenueReportResponse {
        year: query.year,
        month: query.month,
        total_revenue,
        payments_count,
    }))
}

fn billing_error(err: BillingError) -> (StatusCode, String) {
    match &err {
        BillingError::PolicyNotFound(_) | BillingError::ObligationNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        BillingError::PolicyNotActive(_) => (StatusCode::CONFLICT, err.to_string()),
        BillingError::UnknownStatus(_) | BillingError::Storage(_) => internal_error(err),
    }
}

fn internal_error<E: std::fmt::Display>(err: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
