pub mod config;
pub mod contracts;
pub mod db;
pub mod event_bus;

pub use config::ServiceConfig;
pub use contracts::PolicyActivatedEvent;
pub use db::connect_database;
pub use event_bus::{EventBus, POLICIES_ACTIVATED_CHANNEL};
