use std::sync::Arc;

use anyhow::Result;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::credentials::ServiceAccount;
use crate::config::settings::PersistenceConfig;
use crate::resilience::retry::RetrySettings;
use crate::sinks::firestore::FirestoreSink;
use crate::utils::constants::ENV_FIRESTORE_EMULATOR_HOST;

// Declare the static OnceCell to hold the store client.
static STORE_INSTANCE: OnceCell<Arc<FirestoreSink>> = OnceCell::const_new();

/// Initializes the store client on first use and returns the same instance afterwards.
pub async fn get_store(
    cfg: &PersistenceConfig,
    account: ServiceAccount,
    retry: &RetrySettings,
) -> Result<Arc<FirestoreSink>> {
    let store = STORE_INSTANCE
        .get_or_try_init(|| async move {
            info!("Initializing store client ...");
            let emulator = std::env::var(ENV_FIRESTORE_EMULATOR_HOST).ok();
            FirestoreSink::new(cfg, account, retry.clone(), emulator).map(Arc::new)
        })
        .await?;
    Ok(store.clone())
}
