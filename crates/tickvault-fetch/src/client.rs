//! HTTP tick source for the history API.

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tickvault_types::{Category, DateRange, SymbolInfo, TickRecord};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::wire::{DayTicksResponse, InfoResponse, RangeTicksResponse, SymbolsResponse};
use crate::{ChunkStream, FetchError, TickChunk, TickSource};

/// Largest page the range endpoint accepts.
const MAX_RANGE_PAGE_SIZE: usize = 10_000;
/// Largest page the per-day endpoint accepts.
const MAX_DAY_PAGE_SIZE: usize = 50_000;

/// Configuration for the HTTP tick source.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the history API, without a trailing slash.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retry attempts for failed requests.
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds).
    pub max_delay_ms: u64,
    /// Ticks requested per page.
    pub page_size: usize,
    /// User agent string.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 5,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            page_size: 5000,
            user_agent: format!("tickvault/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Tick source backed by the history HTTP API.
///
/// Requests are retried on server errors (5xx), rate limiting (429), and
/// connect or timeout failures, with capped exponential backoff.
#[derive(Debug, Clone)]
pub struct HttpTickSource {
    client: Client,
    config: ClientConfig,
}

impl HttpTickSource {
    /// Creates a new source with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(60))
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()?;
        Ok(Self { client, config })
    }

    /// Creates a source with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_defaults() -> Result<Self, FetchError> {
        Self::new(ClientConfig::default())
    }

    /// Returns the source configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Issues a GET request and decodes the JSON body, retrying transient failures.
    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T, FetchError> {
        let mut attempts = 0;

        loop {
            match self.client.get(url).query(query).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        if attempts < self.config.max_retries {
                            attempts += 1;
                            let delay = self.calculate_backoff_delay(attempts);
                            debug!(url, status = status.as_u16(), attempts, ?delay, "retrying request");
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        return Err(FetchError::ServerError {
                            status: status.as_u16(),
                        });
                    }

                    if status.is_client_error() {
                        return Err(FetchError::ServerError {
                            status: status.as_u16(),
                        });
                    }

                    let body = response.bytes().await?;
                    return serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()));
                }
                Err(e) if Self::is_retryable_error(&e) && attempts < self.config.max_retries => {
                    attempts += 1;
                    let delay = self.calculate_backoff_delay(attempts);
                    debug!(url, error = %e, attempts, ?delay, "retrying request");
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_timeout() => return Err(FetchError::Timeout(attempts + 1)),
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Calculates the backoff delay with exponential backoff and jitter.
    fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        let exp_delay = self
            .config
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(10));
        let capped_delay = exp_delay.min(self.config.max_delay_ms);

        // Deterministic jitter within ±25%.
        let jitter_range = capped_delay / 4;
        let delay = if jitter_range > 0 {
            let offset = (u64::from(attempt) * 17) % (jitter_range * 2);
            (capped_delay + offset).saturating_sub(jitter_range)
        } else {
            capped_delay
        };

        Duration::from_millis(delay.max(100))
    }

    fn is_retryable_error(error: &reqwest::Error) -> bool {
        if error.is_builder() {
            return false;
        }
        error.is_timeout() || error.is_connect() || error.is_request()
    }

    async fn fetch_day_page(
        &self,
        symbol: &str,
        date: NaiveDate,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<TickRecord>, usize), FetchError> {
        let response: DayTicksResponse = self
            .get_json(
                &self.url("/api/history/ticks"),
                &[
                    ("symbol", symbol.to_string()),
                    ("date", date.to_string()),
                    ("offset", offset.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        let ticks = response
            .ticks
            .into_iter()
            .map(|t| t.into_tick(symbol))
            .collect();
        Ok((ticks, response.total))
    }
}

/// Cursor of a streaming day fetch.
struct DayCursor {
    source: HttpTickSource,
    symbol: String,
    date: NaiveDate,
    offset: usize,
    done: bool,
    cancel: CancellationToken,
}

#[async_trait]
impl TickSource for HttpTickSource {
    async fn fetch_available_symbols(&self) -> Result<Vec<SymbolInfo>, FetchError> {
        let response: SymbolsResponse = self.get_json(&self.url("/api/history/symbols"), &[]).await?;
        Ok(response.symbols.into_iter().map(SymbolInfo::from).collect())
    }

    async fn fetch_symbol_info(&self, symbol: &str) -> Result<SymbolInfo, FetchError> {
        let response: InfoResponse = self
            .get_json(&self.url("/api/history/info"), &[("symbol", symbol.to_string())])
            .await
            .map_err(|e| match e {
                FetchError::ServerError { status: 400 | 404 } => FetchError::UnknownSymbol(symbol.to_string()),
                other => other,
            })?;
        Ok(response.into_symbol_info(Category::from_symbol(symbol)))
    }

    fn stream_fetch_ticks(&self, symbol: &str, date: NaiveDate, cancel: CancellationToken) -> ChunkStream {
        let cursor = DayCursor {
            source: self.clone(),
            symbol: symbol.to_string(),
            date,
            offset: 0,
            done: false,
            cancel,
        };

        stream::try_unfold(cursor, |mut cursor| async move {
            if cursor.done {
                return Ok(None);
            }
            if cursor.cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let limit = cursor.source.config.page_size.clamp(1, MAX_DAY_PAGE_SIZE);
            let page = tokio::select! {
                () = cursor.cancel.cancelled() => return Err(FetchError::Cancelled),
                page = cursor.source.fetch_day_page(&cursor.symbol, cursor.date, cursor.offset, limit) => page?,
            };
            let (ticks, total) = page;

            cursor.offset += ticks.len();
            cursor.done = ticks.len() < limit || cursor.offset >= total;
            let chunk = TickChunk {
                symbol: cursor.symbol.clone(),
                date: cursor.date,
                ticks,
                fetched: cursor.offset,
                total: Some(total),
            };
            Ok(Some((chunk, cursor)))
        })
        .boxed()
    }

    async fn fetch_ticks_in_range(&self, symbol: &str, range: DateRange) -> Result<Vec<TickRecord>, FetchError> {
        let page_size = self.config.page_size.clamp(1, MAX_RANGE_PAGE_SIZE);
        let from = range.start_ms();
        let to = range.end_ms_exclusive();
        let url = self.url(&format!("/api/history/ticks/{symbol}"));

        let mut ticks = Vec::new();
        for page in 1.. {
            let response: RangeTicksResponse = self
                .get_json(
                    &url,
                    &[
                        ("from", rfc3339(from)),
                        ("to", rfc3339(to)),
                        ("page", page.to_string()),
                        ("page_size", page_size.to_string()),
                    ],
                )
                .await?;

            let received = response.ticks.len();
            ticks.extend(
                response
                    .ticks
                    .into_iter()
                    .filter_map(|t| t.into_tick(symbol))
                    .filter(|t| t.timestamp_ms >= from && t.timestamp_ms < to),
            );
            if !response.has_more || received == 0 {
                break;
            }
        }

        let before = ticks.len();
        ticks.sort_by_key(|t| t.timestamp_ms);
        ticks.dedup_by_key(|t| t.timestamp_ms);
        if ticks.len() != before {
            warn!(symbol, duplicates = before - ticks.len(), "range fetch returned duplicate ticks");
        }
        Ok(ticks)
    }
}

fn rfc3339(timestamp_ms: u64) -> String {
    i64::try_from(timestamp_ms)
        .ok()
        .and_then(chrono::DateTime::from_timestamp_millis)
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.base_delay_ms, 500);
        assert_eq!(config.max_delay_ms, 30_000);
        assert_eq!(config.page_size, 5000);
    }

    #[tokio::test]
    async fn test_client_creation() {
        assert!(HttpTickSource::with_defaults().is_ok());
    }

    #[test]
    fn test_backoff_delay_calculation() {
        let source = HttpTickSource::with_defaults().unwrap();

        let delay1 = source.calculate_backoff_delay(1);
        assert!(delay1.as_millis() >= 750 && delay1.as_millis() <= 1250);

        let delay2 = source.calculate_backoff_delay(2);
        assert!(delay2.as_millis() >= 1500 && delay2.as_millis() <= 2500);

        let delay_high = source.calculate_backoff_delay(20);
        assert!(delay_high.as_millis() <= 37_500);
    }

    #[test]
    fn test_url_building() {
        let source = HttpTickSource::new(ClientConfig {
            base_url: "http://example.test/".to_string(),
            ..ClientConfig::default()
        })
        .unwrap();
        assert_eq!(
            source.url("/api/history/symbols"),
            "http://example.test/api/history/symbols"
        );
    }

    #[test]
    fn test_rfc3339() {
        assert_eq!(rfc3339(1_768_867_200_000), "2026-01-20T00:00:00Z");
    }

    #[tokio::test]
    async fn test_cancelled_stream() {
        let source = HttpTickSource::with_defaults().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let date = NaiveDate::from_ymd_opt(2026, 1, 20).unwrap();
        let result: Result<Vec<TickChunk>, FetchError> =
            source.stream_fetch_ticks("EURUSD", date, cancel).try_collect().await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }
}
