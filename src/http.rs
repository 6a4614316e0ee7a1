use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{GdcError, RequestFailure};
use crate::rate_limit::{Clock, RateLimitSettings, RateLimiter, SystemClock};
use crate::response::SearchResponse;

/// Ordered query parameters of one request.
pub type QueryParams = Vec<(String, String)>;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpSettings {
    pub base_url: String,
    pub rate_limit: RateLimitSettings,
    pub page_size: usize,
    /// Retries after the first attempt, so a request is tried `max_retries + 1` times.
    pub max_retries: usize,
    pub retry_base_delay: Duration,
    pub timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            base_url: crate::config::DEFAULT_BASE_URL.to_string(),
            rate_limit: RateLimitSettings::default(),
            page_size: crate::config::DEFAULT_PAGE_SIZE,
            max_retries: crate::config::DEFAULT_MAX_RETRIES,
            retry_base_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Request,
    Other,
}

#[derive(Debug, Clone)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::Timeout | TransportErrorKind::Connect | TransportErrorKind::Request
        )
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_request() {
            TransportErrorKind::Request
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, err.to_string())
    }
}

/// One GET round trip. Status handling and retries live in [`HttpClient`].
pub trait Transport {
    fn get(&self, url: &str, query: &[(String, String)])
    -> Result<TransportResponse, TransportError>;
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, GdcError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("gdc-fm/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GdcError::HttpSetup(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| GdcError::HttpSetup(err.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn get(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        let response = self.client.get(url).query(query).send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(TransportResponse { status, body })
    }
}

/// Rate-limited, retrying JSON client for the portal API.
pub struct HttpClient<T: Transport, C: Clock = SystemClock> {
    transport: T,
    limiter: RateLimiter<C>,
    settings: HttpSettings,
}

impl<T: Transport> HttpClient<T, SystemClock> {
    pub fn new(transport: T, settings: HttpSettings) -> Self {
        Self::with_clock(transport, settings, SystemClock)
    }
}

impl<T: Transport, C: Clock> HttpClient<T, C> {
    pub fn with_clock(transport: T, settings: HttpSettings, clock: C) -> Self {
        let limiter = RateLimiter::with_clock(settings.rate_limit, clock);
        Self {
            transport,
            limiter,
            settings,
        }
    }

    pub fn settings(&self) -> &HttpSettings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.settings.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Issues one logical request and returns the parsed JSON body.
    ///
    /// Every attempt, including retries, first passes through the rate limiter.
    pub fn fetch(&mut self, endpoint: &str, params: &[(String, String)]) -> Result<Value, GdcError> {
        let body = self.fetch_body(endpoint, params)?;
        serde_json::from_str(&body)
            .map_err(|err| request_error(endpoint, params, RequestFailure::Decode(err.to_string())))
    }

    /// Like [`HttpClient::fetch`], decoding into an explicit response shape.
    pub fn fetch_as<R: DeserializeOwned>(
        &mut self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<R, GdcError> {
        let body = self.fetch_body(endpoint, params)?;
        serde_json::from_str(&body)
            .map_err(|err| request_error(endpoint, params, RequestFailure::Decode(err.to_string())))
    }

    /// Lazily walks a search endpoint page by page using `from`/`size` offsets.
    pub fn paginate<H: DeserializeOwned>(
        &mut self,
        endpoint: &str,
        base_params: QueryParams,
        page_size: usize,
    ) -> Pages<'_, T, C, H> {
        Pages {
            client: self,
            endpoint: endpoint.to_string(),
            base_params,
            page_size: page_size.max(1),
            offset: 0,
            done: false,
            _hit: PhantomData,
        }
    }

    fn fetch_body(&mut self, endpoint: &str, params: &[(String, String)]) -> Result<String, GdcError> {
        let url = self.endpoint_url(endpoint);
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            self.limiter.acquire();

            let transient = match self.transport.get(&url, params) {
                Ok(resp) if (200..300).contains(&resp.status) => return Ok(resp.body),
                Ok(resp) if is_retryable_status(resp.status) => format!("status {}", resp.status),
                Ok(resp) => {
                    let message = if resp.body.trim().is_empty() {
                        "GDC request failed".to_string()
                    } else {
                        resp.body
                    };
                    return Err(request_error(
                        endpoint,
                        params,
                        RequestFailure::Status {
                            status: resp.status,
                            message,
                        },
                    ));
                }
                Err(err) if err.is_retryable() => err.to_string(),
                Err(err) => {
                    return Err(request_error(
                        endpoint,
                        params,
                        RequestFailure::Network(err.to_string()),
                    ));
                }
            };

            if attempt > self.settings.max_retries {
                return Err(request_error(
                    endpoint,
                    params,
                    RequestFailure::RetriesExhausted {
                        attempts: attempt,
                        last: transient,
                    },
                ));
            }

            let delay = backoff_delay(self.settings.retry_base_delay, attempt);
            tracing::warn!(
                endpoint,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "transient failure ({transient}), retrying"
            );
            self.limiter.clock().sleep(delay);
        }
    }
}

/// Iterator over hit batches of a paginated search.
///
/// Stops after an empty page or once the offset reaches the reported total,
/// and after the first error.
pub struct Pages<'a, T: Transport, C: Clock, H> {
    client: &'a mut HttpClient<T, C>,
    endpoint: String,
    base_params: QueryParams,
    page_size: usize,
    offset: usize,
    done: bool,
    _hit: PhantomData<fn() -> H>,
}

impl<T: Transport, C: Clock, H: DeserializeOwned> Iterator for Pages<'_, T, C, H> {
    type Item = Result<Vec<H>, GdcError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut params = self.base_params.clone();
        params.retain(|(key, _)| key != "size" && key != "from");
        params.push(("size".to_string(), self.page_size.to_string()));
        params.push(("from".to_string(), self.offset.to_string()));

        let response: SearchResponse<H> = match self.client.fetch_as(&self.endpoint, &params) {
            Ok(response) => response,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };

        let hits = response.data.hits;
        if hits.is_empty() {
            self.done = true;
            return None;
        }

        self.offset += self.page_size;
        if self.offset as u64 >= response.data.pagination.total {
            self.done = true;
        }
        Some(Ok(hits))
    }
}

/// Backoff before the retry that follows failed attempt number `attempt` (1-based).
pub fn backoff_delay(base: Duration, attempt: usize) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16) as u32;
    base.saturating_mul(1u32 << exponent)
}

pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn request_error(endpoint: &str, params: &[(String, String)], source: RequestFailure) -> GdcError {
    GdcError::Request {
        endpoint: endpoint.to_string(),
        params: describe_params(params),
        source,
    }
}

fn describe_params(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}
