use chrono::NaiveDate;
use premia_core::PolicyStatus;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::{error::BillingError, generator::generate_for_policy, store};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyFailure {
    pub policy_id: Uuid,
    pub error: String,
}

/// Result of one batch generation run. A run with failures is still a
/// successful run; the failures ride along per policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub policies_processed: u64,
    pub payments_created: u64,
    pub errors: Vec<PolicyFailure>,
}

impl BatchOutcome {
    fn absorb(&mut self, policy_id: Uuid, result: Result<u32, BillingError>) {
        match result {
            Ok(created) => {
                self.policies_processed += 1;
                self.payments_created += u64::from(created);
            }
            Err(err) => self.errors.push(PolicyFailure {
                policy_id,
                error: err.to_string(),
            }),
        }
    }
}

/// Generate schedules for every active, unexpired policy. One policy
/// failing never aborts the rest of the run.
pub async fn generate_for_all_active(
    pool: &PgPool,
    today: NaiveDate,
) -> Result<BatchOutcome, BillingError> {
    let policies = store::active_policy_schedules(pool, today).await?;

    let mut outcome = BatchOutcome::default();
    for policy in &policies {
        let result = generate_for_policy(pool, policy, today).await;
        if let Err(err) = &result {
            error!(
                "payment generation failed for policy {}: {err}",
                policy.policy_id
            );
        }
        outcome.absorb(policy.policy_id, result);
    }

    Ok(outcome)
}

/// Generate the schedule for one policy, typically right after it turns
/// active.
pub async fn generate_for_policy_id(
    pool: &PgPool,
    policy_id: Uuid,
    today: NaiveDate,
) -> Result<u32, BillingError> {
    let Some((schedule, status_raw)) = store::policy_schedule_by_id(pool, policy_id).await? else {
        return Err(BillingError::PolicyNotFound(policy_id));
    };

    if PolicyStatus::parse(&status_raw) != Some(PolicyStatus::Active) {
        return Err(BillingError::PolicyNotActive(policy_id));
    }

    generate_for_policy(pool, &schedule, today).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_outcome_collects_failures_without_losing_successes() {
        let good_a = Uuid::new_v4();
        let bad = Uuid::new_v4();
        let good_b = Uuid::new_v4();

        let mut outcome = BatchOutcome::default();
        outcome.absorb(good_a, Ok(3));
        outcome.absorb(bad, Err(BillingError::PolicyNotActive(bad)));
        outcome.absorb(good_b, Ok(2));

        assert_eq!(outcome.policies_processed, 2);
        assert_eq!(outcome.payments_created, 5);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].policy_id, bad);
        assert!(outcome.errors[0].error.contains("not active"));
    }

    #[test]
    fn empty_run_is_a_clean_outcome() {
        let outcome = BatchOutcome::default();
        assert_eq!(outcome.policies_processed, 0);
        assert_eq!(outcome.payments_created, 0);
        assert!(outcome.errors.is_empty());
    }
}
