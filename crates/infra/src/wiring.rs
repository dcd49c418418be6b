//! Live adapter construction from a resolved [`RunConfig`].

use tracing::info;

use fleetsync_pipeline::{AdapterFactory, ConfigError, RunConfig, RunError};

use crate::credentials::CredentialsRef;
use crate::directory::{DEFAULT_BASE_URL, DirectoryDeviceSource};
use crate::postgres::{PostgresRecordStore, TableName};

/// Builds the HTTP device source and the Postgres record store.
///
/// Credentials are loaded here, so a missing token aborts the run before the
/// listing call. The database pool connects lazily: an unreachable database
/// shows up per device as a transient store failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveAdapters;

#[async_trait::async_trait]
impl AdapterFactory for LiveAdapters {
    type Source = DirectoryDeviceSource;
    type Store = PostgresRecordStore;

    async fn build(&self, config: &RunConfig) -> Result<(Self::Source, Self::Store), RunError> {
        let token = CredentialsRef::parse(&config.api_credentials_ref)?.resolve()?;
        let base_url = config.api_base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let source = DirectoryDeviceSource::new(base_url, &config.tenant_id, token, config.api_timeout)
            .map_err(|e| ConfigError::invalid("api_base_url", e.to_string()))?
            .with_listing_retry(config.listing_retry.clone());

        let database_url = config
            .database_url
            .as_deref()
            .ok_or_else(|| ConfigError::Missing(format!("tenants.{}.database_url", config.tenant_id)))?;
        let table = TableName::parse(&config.target_table)?;
        let store = PostgresRecordStore::connect_lazy(database_url, table, config.store_timeout)
            .map_err(|e| RunError::setup(e.to_string()))?;

        info!(
            tenant_id = %config.tenant_id,
            api = base_url,
            table = %store.table(),
            "adapters ready"
        );
        Ok((source, store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetsync_core::TenantId;

    fn config(creds: &str) -> RunConfig {
        RunConfig::new(TenantId::new("c01fleet").unwrap(), creds, "devices")
    }

    #[tokio::test]
    async fn missing_credentials_abort_setup() {
        let err = LiveAdapters
            .build(&config("env:FLEETSYNC_WIRING_TEST_UNSET_TOKEN"))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Configuration(ConfigError::Missing(_))));
    }

    #[tokio::test]
    async fn missing_database_url_is_a_configuration_error() {
        let path = std::env::temp_dir().join(format!("fleetsync-wiring-{}", uuid::Uuid::now_v7()));
        std::fs::write(&path, "token").unwrap();

        let creds = format!("file:{}", path.display());
        let err = LiveAdapters.build(&config(&creds)).await.unwrap_err();
        assert!(matches!(err, RunError::Configuration(ConfigError::Missing(key)) if key.ends_with("database_url")));

        let mut with_db = config(&creds);
        with_db.database_url = Some("postgres://fleet@localhost/fleet".into());
        let (_source, store) = LiveAdapters.build(&with_db).await.unwrap();
        assert_eq!(store.table().as_str(), "devices");

        std::fs::remove_file(&path).unwrap();
    }
}
