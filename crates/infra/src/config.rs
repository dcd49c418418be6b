//! Parameter-store backed configuration.
//!
//! Sources, later ones winning:
//!
//! 1. optional TOML file
//! 2. environment, `FLEETSYNC__` prefix with `__` as the path separator
//!    (`FLEETSYNC__TENANTS__C01FLEET__TARGET_TABLE=devices`)
//!
//! ```toml
//! max_attempts = 3                  # defaults for every tenant
//! database_url = "postgres://..."
//!
//! [tenants.c01fleet]
//! api_credentials_ref = "env:DIRECTORY_TOKEN"
//! target_table = "inventory.chrome_devices"
//! api_timeout_ms = 10000
//! listing_attempts = 5              # per listing page, first included
//!
//! [tenants.c01fleet.classification]
//! device_not_found = "bounded:1"
//! ```
//!
//! Tenant sections are matched case-insensitively.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, Map, Value};
use serde::de::DeserializeOwned;
use tracing::debug;

use fleetsync_core::TenantId;
use fleetsync_pipeline::{
    BackoffStrategy, ClassificationPolicy, ConfigError, ConfigResolver, Disposition, ErrorClass,
    RetryPolicy, RunConfig,
};

use crate::postgres::TableName;

pub const ENV_PREFIX: &str = "FLEETSYNC";

/// Resolves [`RunConfig`]s from layered settings.
#[derive(Debug, Clone)]
pub struct ParameterStoreResolver {
    settings: Config,
}

impl ParameterStoreResolver {
    /// Load the file (if any) and the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::Unavailable(e.to_string()))?;
        Ok(Self::from_settings(settings))
    }

    pub fn from_settings(settings: Config) -> Self {
        Self { settings }
    }

    fn resolve_sync(&self, tenant_id: &TenantId) -> Result<RunConfig, ConfigError> {
        let scope = TenantScope::new(&self.settings, tenant_id)?;

        let api_credentials_ref = scope.required("api_credentials_ref")?;
        let target_table = scope.required("target_table")?;
        TableName::parse(&target_table)?;

        let defaults = RetryPolicy::default();
        let max_attempts = scope.optional::<u32>("max_attempts")?.unwrap_or(defaults.max_attempts);
        if max_attempts == 0 {
            return Err(ConfigError::invalid(scope.path("max_attempts"), "must be at least 1"));
        }
        let strategy = match scope.optional::<String>("backoff")? {
            Some(raw) => parse_backoff(&raw)
                .ok_or_else(|| ConfigError::invalid(scope.path("backoff"), format!("unknown strategy {raw:?}")))?,
            None => defaults.strategy,
        };
        let retry = RetryPolicy {
            max_attempts,
            base_delay: scope.millis("retry_base_delay_ms", false)?.unwrap_or(defaults.base_delay),
            max_delay: scope.millis("retry_max_delay_ms", false)?.unwrap_or(defaults.max_delay),
            strategy,
        };

        let mut config = RunConfig::new(tenant_id.clone(), api_credentials_ref, target_table)
            .with_retry(retry);
        let listing_attempts = scope
            .optional::<u32>("listing_attempts")?
            .unwrap_or(config.listing_retry.max_attempts);
        if listing_attempts == 0 {
            return Err(ConfigError::invalid(scope.path("listing_attempts"), "must be at least 1"));
        }
        config.listing_retry.max_attempts = listing_attempts;
        config.listing_retry.base_delay = scope
            .millis("listing_retry_base_delay_ms", false)?
            .unwrap_or(config.listing_retry.base_delay);
        config.api_timeout = scope.millis("api_timeout_ms", true)?.unwrap_or(config.api_timeout);
        config.store_timeout = scope.millis("store_timeout_ms", true)?.unwrap_or(config.store_timeout);
        config.api_base_url = scope.optional("api_base_url")?;
        config.database_url = scope.optional("database_url")?;
        config.classification = scope.classification()?;

        debug!(
            %tenant_id,
            table = %config.target_table,
            max_attempts = config.retry.max_attempts,
            listing_attempts = config.listing_retry.max_attempts,
            "tenant configuration resolved"
        );
        Ok(config)
    }
}

#[async_trait::async_trait]
impl ConfigResolver for ParameterStoreResolver {
    async fn resolve(&self, tenant_id: &TenantId) -> Result<RunConfig, ConfigError> {
        self.resolve_sync(tenant_id)
    }
}

/// Lookups for one tenant: its own section first, then top-level defaults.
struct TenantScope<'a> {
    settings: &'a Config,
    tenant_id: &'a TenantId,
    section: Option<Map<String, Value>>,
}

impl<'a> TenantScope<'a> {
    fn new(settings: &'a Config, tenant_id: &'a TenantId) -> Result<Self, ConfigError> {
        let section = match settings.get_table("tenants") {
            Ok(tenants) => tenants
                .into_iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(tenant_id.as_str()))
                .map(|(_, value)| value.into_table())
                .transpose()
                .map_err(|e| ConfigError::invalid(format!("tenants.{tenant_id}"), e.to_string()))?,
            Err(config::ConfigError::NotFound(_)) => None,
            Err(e) => return Err(ConfigError::invalid("tenants", e.to_string())),
        };
        Ok(Self {
            settings,
            tenant_id,
            section,
        })
    }

    fn path(&self, key: &str) -> String {
        format!("tenants.{}.{key}", self.tenant_id)
    }

    fn scoped(&self, key: &str) -> Option<Value> {
        self.section
            .as_ref()?
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.clone())
    }

    /// Tenant-scoped only; blank counts as missing.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        let value = self
            .scoped(key)
            .map(|v| decode::<String>(&self.path(key), v))
            .transpose()?;
        match value {
            Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
            _ => Err(ConfigError::Missing(self.path(key))),
        }
    }

    fn optional<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        if let Some(value) = self.scoped(key) {
            return decode(&self.path(key), value).map(Some);
        }
        match self.settings.get::<T>(key) {
            Ok(value) => Ok(Some(value)),
            Err(config::ConfigError::NotFound(_)) => Ok(None),
            Err(e) => Err(ConfigError::invalid(key, e.to_string())),
        }
    }

    fn millis(&self, key: &str, non_zero: bool) -> Result<Option<Duration>, ConfigError> {
        match self.optional::<u64>(key)? {
            Some(0) if non_zero => Err(ConfigError::invalid(self.path(key), "must be positive")),
            Some(ms) => Ok(Some(Duration::from_millis(ms))),
            None => Ok(None),
        }
    }

    /// Defaults, then `auth_failure_retries`, then explicit per-class
    /// overrides (top-level before tenant).
    fn classification(&self) -> Result<ClassificationPolicy, ConfigError> {
        let mut policy = ClassificationPolicy::default();
        if let Some(retries) = self.optional::<u32>("auth_failure_retries")? {
            policy = policy.with(ErrorClass::AuthFailure, Disposition::Bounded { retries });
        }

        let global = match self.settings.get_table("classification") {
            Ok(table) => Some(table),
            Err(config::ConfigError::NotFound(_)) => None,
            Err(e) => return Err(ConfigError::invalid("classification", e.to_string())),
        };
        let scoped = self
            .scoped("classification")
            .map(|v| v.into_table())
            .transpose()
            .map_err(|e| ConfigError::invalid(self.path("classification"), e.to_string()))?;

        for table in [global, scoped].into_iter().flatten() {
            for (name, value) in table {
                let key = format!("classification.{name}");
                let class = parse_class(&name)
                    .ok_or_else(|| ConfigError::invalid(&key, "unknown error class"))?;
                let raw: String = decode(&key, value)?;
                let disposition = parse_disposition(&raw)
                    .ok_or_else(|| ConfigError::invalid(&key, format!("unknown disposition {raw:?}")))?;
                policy = policy.with(class, disposition);
            }
        }
        Ok(policy)
    }
}

fn decode<T: DeserializeOwned>(key: &str, value: Value) -> Result<T, ConfigError> {
    value
        .try_deserialize()
        .map_err(|e| ConfigError::invalid(key, e.to_string()))
}

fn parse_class(raw: &str) -> Option<ErrorClass> {
    ErrorClass::ALL
        .into_iter()
        .find(|class| class.as_str().eq_ignore_ascii_case(raw.trim()))
}

fn parse_backoff(raw: &str) -> Option<BackoffStrategy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "fixed" => Some(BackoffStrategy::Fixed),
        "linear" => Some(BackoffStrategy::Linear),
        "exponential" => Some(BackoffStrategy::Exponential),
        _ => None,
    }
}

/// `transient`, `permanent` or `bounded:<retries>`.
fn parse_disposition(raw: &str) -> Option<Disposition> {
    let raw = raw.trim().to_ascii_lowercase();
    match raw.split_once(':') {
        Some(("bounded", n)) => n.trim().parse().ok().map(|retries| Disposition::Bounded { retries }),
        None if raw == "transient" => Some(Disposition::Transient),
        None if raw == "permanent" => Some(Disposition::Permanent),
        _ => None,
    }
}
