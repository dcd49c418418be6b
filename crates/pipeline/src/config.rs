//! Resolved run parameters, passed explicitly into the run controller.

use std::time::Duration;

use fleetsync_core::TenantId;

use crate::classify::ClassificationPolicy;
use crate::queue::RetryPolicy;

/// Default deadline for a single external call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default attempts per listing page, first included.
pub const DEFAULT_LISTING_ATTEMPTS: u32 = 5;

/// Everything one run needs to know, resolved up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub tenant_id: TenantId,
    /// Where the device source credentials live (e.g. `env:VAR`, `file:/path`).
    pub api_credentials_ref: String,
    /// Table holding device records.
    pub target_table: String,
    /// Vendor API endpoint override.
    pub api_base_url: Option<String>,
    pub database_url: Option<String>,
    pub retry: RetryPolicy,
    /// Per-page retry of the listing call; applied inside the device source.
    pub listing_retry: RetryPolicy,
    pub api_timeout: Duration,
    pub store_timeout: Duration,
    pub classification: ClassificationPolicy,
}

impl RunConfig {
    pub fn new(
        tenant_id: TenantId,
        api_credentials_ref: impl Into<String>,
        target_table: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id,
            api_credentials_ref: api_credentials_ref.into(),
            target_table: target_table.into(),
            api_base_url: None,
            database_url: None,
            retry: RetryPolicy::default(),
            listing_retry: RetryPolicy {
                max_attempts: DEFAULT_LISTING_ATTEMPTS,
                ..RetryPolicy::default()
            },
            api_timeout: DEFAULT_CALL_TIMEOUT,
            store_timeout: DEFAULT_CALL_TIMEOUT,
            classification: ClassificationPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_listing_retry(mut self, listing_retry: RetryPolicy) -> Self {
        self.listing_retry = listing_retry;
        self
    }

    pub fn with_timeouts(mut self, api: Duration, store: Duration) -> Self {
        self.api_timeout = api;
        self.store_timeout = store;
        self
    }

    pub fn with_classification(mut self, classification: ClassificationPolicy) -> Self {
        self.classification = classification;
        self
    }
}
