//! Device source over the vendor's directory API.
//!
//! Listing pages through `GET {base}/admin/directory/v1/customer/{tenant}/devices/chromeos`
//! with `pageToken`/`nextPageToken`; detail is one `GET .../chromeos/{deviceId}`.
//! A listing page that fails with a transient error is re-requested under the
//! source's listing retry policy; detail calls are retried by the work queue.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveDate};
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use fleetsync_core::{DeviceDetail, DeviceId, DeviceReference, TenantId};
use fleetsync_pipeline::config::DEFAULT_LISTING_ATTEMPTS;
use fleetsync_pipeline::{DeviceListing, DeviceSource, RetryPolicy, SourceError};

pub const DEFAULT_BASE_URL: &str = "https://admin.googleapis.com";

/// Devices requested per listing page.
pub const PAGE_SIZE: u32 = 300;

/// Guards against a server that keeps handing out page tokens.
const MAX_PAGES: usize = 10_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DevicePage {
    #[serde(default)]
    chromeosdevices: Vec<WireDevice>,
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDevice {
    device_id: Option<String>,
    serial_number: Option<String>,
    mac_address: Option<String>,
    model: Option<String>,
    status: Option<String>,
    last_sync: Option<String>,
    org_unit_path: Option<String>,
}

impl From<WireDevice> for DeviceDetail {
    fn from(wire: WireDevice) -> Self {
        DeviceDetail {
            device_id: wire.device_id,
            serial_number: wire.serial_number,
            hardware_address_raw: wire.mac_address,
            model: wire.model,
            status: wire.status,
            last_sync: wire.last_sync.as_deref().and_then(parse_last_sync),
            org_unit_path: wire.org_unit_path,
        }
    }
}

/// HTTP device source for one tenant.
#[derive(Clone)]
pub struct DirectoryDeviceSource {
    client: Client,
    base_url: Url,
    customer: String,
    token: String,
    listing_retry: RetryPolicy,
}

impl fmt::Debug for DirectoryDeviceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryDeviceSource")
            .field("base_url", &self.base_url.as_str())
            .field("customer", &self.customer)
            .field("token", &"<redacted>")
            .field("listing_retry", &self.listing_retry)
            .finish()
    }
}

impl DirectoryDeviceSource {
    /// `timeout` bounds each request end to end.
    pub fn new(
        base_url: &str,
        tenant_id: &TenantId,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| SourceError::Other(format!("invalid api base url {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(SourceError::Other(format!("api base url {base_url} cannot be a base")));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Other(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            customer: tenant_id.to_string(),
            token: token.into(),
            listing_retry: RetryPolicy {
                max_attempts: DEFAULT_LISTING_ATTEMPTS,
                ..RetryPolicy::default()
            },
        })
    }

    pub fn with_listing_retry(mut self, policy: RetryPolicy) -> Self {
        self.listing_retry = policy;
        self
    }

    fn devices_url(&self, device_id: Option<&DeviceId>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "admin",
                "directory",
                "v1",
                "customer",
                self.customer.as_str(),
                "devices",
                "chromeos",
            ]);
            if let Some(id) = device_id {
                segments.push(id.as_str());
            }
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, SourceError> {
        let resp = request
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(map_status(status, &body))
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, SourceError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(map_transport_error)
    }

    /// One listing page, re-requested while the failure is transient and
    /// the listing retry policy allows another attempt.
    async fn fetch_page(&self, page_no: usize, page_token: Option<&str>) -> Result<DevicePage, SourceError> {
        let page_size = PAGE_SIZE.to_string();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut request = self
                .client
                .get(self.devices_url(None))
                .query(&[("projection", "BASIC"), ("maxResults", page_size.as_str())]);
            if let Some(token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            match self.get_json::<DevicePage>(request).await {
                Ok(page) => return Ok(page),
                Err(err @ (SourceError::Unavailable(_) | SourceError::Timeout(_)))
                    if self.listing_retry.should_retry(attempt) =>
                {
                    let delay = self.listing_retry.delay_for_pass(attempt);
                    warn!(
                        page_no,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "listing page failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait::async_trait]
impl DeviceSource for DirectoryDeviceSource {
    #[instrument(skip(self), fields(customer = %self.customer), err)]
    async fn list_devices(&self, tenant_id: &TenantId) -> Result<DeviceListing, SourceError> {
        let mut listing = DeviceListing::default();
        let mut page_token: Option<String> = None;

        for page_no in 1..=MAX_PAGES {
            let page = self.fetch_page(page_no, page_token.as_deref()).await?;
            debug!(page_no, devices = page.chromeosdevices.len(), "listing page fetched");

            for device in page.chromeosdevices {
                match device.device_id.as_deref().map(DeviceId::new) {
                    Some(Ok(device_id)) => listing.devices.push(DeviceReference {
                        device_id,
                        serial_number: device.serial_number,
                    }),
                    _ => {
                        listing.skipped += 1;
                        warn!(
                            serial_number = device.serial_number.as_deref().unwrap_or(""),
                            "listing entry without deviceId skipped"
                        );
                    }
                }
            }

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => return Ok(listing),
            }
        }

        Err(SourceError::Malformed(format!(
            "listing for {tenant_id} did not terminate after {MAX_PAGES} pages"
        )))
    }

    #[instrument(skip(self), err)]
    async fn get_device_detail(&self, device_id: &DeviceId) -> Result<DeviceDetail, SourceError> {
        let request = self
            .client
            .get(self.devices_url(Some(device_id)))
            .query(&[("projection", "FULL")]);
        let wire: WireDevice = self.get_json(request).await?;
        Ok(wire.into())
    }
}

/// Map a non-success HTTP status (and its body) to a source error.
///
/// Rate limiting is reported as 403 with a `rateLimitExceeded` or
/// `userRateLimitExceeded` reason as well as 429; both are transient.
pub(crate) fn map_status(status: StatusCode, body: &str) -> SourceError {
    let detail = format!("{status}: {}", body.chars().take(200).collect::<String>());
    let rate_limited = body.to_ascii_lowercase().contains("ratelimitexceeded");

    match status {
        StatusCode::TOO_MANY_REQUESTS => SourceError::Unavailable(detail),
        StatusCode::FORBIDDEN if rate_limited => SourceError::Unavailable(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::Unauthorized(detail),
        StatusCode::REQUEST_TIMEOUT => SourceError::Timeout(detail),
        s if s.is_server_error() => SourceError::Unavailable(detail),
        s if s.is_client_error() => SourceError::NotFound(detail),
        _ => SourceError::Other(detail),
    }
}

fn map_transport_error(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout(err.to_string())
    } else if err.is_decode() {
        SourceError::Malformed(err.to_string())
    } else if err.is_connect() || err.is_request() || err.is_body() {
        SourceError::Unavailable(err.to_string())
    } else {
        SourceError::Other(err.to_string())
    }
}

/// `lastSync` is an RFC 3339 timestamp; only its calendar date is kept.
/// Unparseable values become `None` rather than failing the device.
pub(crate) fn parse_last_sync(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}
