use std::sync::Arc;

use interfaces::NotificationStore;
use log::info;
use notifier_models::core::NotificationRecord;

mod errors;
pub mod in_memory;
pub mod interfaces;
mod mappers;
pub mod sqlite;

pub use errors::StoreError;

/// Backend selected by the scheme of a store URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUri {
    Sqlite(String),
    Memory,
}

impl StoreUri {
    pub fn parse(uri: &str) -> Result<Self, StoreError> {
        match uri.split_once(':') {
            Some(("sqlite", _)) => Ok(StoreUri::Sqlite(uri.to_string())),
            Some(("memory", _)) => Ok(StoreUri::Memory),
            _ => Err(StoreError::UnsupportedUri(uri.to_string())),
        }
    }
}

pub async fn initialize_store(store: &Arc<impl NotificationStore>) -> Result<(), StoreError> {
    info!("Initialize notification store");
    store.initialize().await
}

pub(crate) fn validate_record(record: &NotificationRecord) -> Result<(), StoreError> {
    let missing = record.missing_fields();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(StoreError::Validation(format!(
            "missing required field(s): {}",
            missing.join(", ")
        )))
    }
}
