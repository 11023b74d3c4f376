use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("policy {0} not found")]
    PolicyNotFound(Uuid),
    #[error("policy {0} is not active")]
    PolicyNotActive(Uuid),
    #[error("payment obligation {0} not found")]
    ObligationNotFound(Uuid),
    #[error("unrecognized payment status '{0}' in the payment store")]
    UnknownStatus(String),
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}
