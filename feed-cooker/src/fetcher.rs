use crate::traits::{ConditionalHeaders, HttpTransport};
use crate::types::{
    CachedResponse, CookerError, FetchConfig, Fetched, ResponseCache, ResponseOrigin, Result,
    TransportError, DEFAULT_ENCODING,
};
use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderName, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// `HttpTransport` backed by a shared reqwest client.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()
            .map_err(|e| CookerError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        conditional: &ConditionalHeaders,
    ) -> std::result::Result<CachedResponse, TransportError> {
        let mut request = self.client.get(url);

        if let Some(etag) = &conditional.if_none_match {
            request = request.header(IF_NONE_MATCH, etag);
        }

        if let Some(last_modified) = &conditional.if_modified_since {
            request = request.header(IF_MODIFIED_SINCE, last_modified);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let etag = header_value(response.headers(), ETAG);
        let last_modified = header_value(response.headers(), LAST_MODIFIED);
        let content_type = header_value(response.headers(), CONTENT_TYPE);
        let encoding = content_type
            .as_deref()
            .and_then(charset_of)
            .unwrap_or_else(|| DEFAULT_ENCODING.to_string());

        // reqwest falls back to the given charset when none is declared
        let body = response.text_with_charset(DEFAULT_ENCODING).await?;

        Ok(CachedResponse {
            url: url.to_string(),
            status,
            etag,
            last_modified,
            content_type,
            body,
            encoding,
        })
    }
}

fn header_value(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Extracts the `charset` parameter of a Content-Type value.
pub fn charset_of(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            let value = value.trim().trim_matches('"');
            (!value.is_empty()).then(|| value.to_ascii_lowercase())
        } else {
            None
        }
    })
}

/// GET with ETag/Last-Modified revalidation and fallback to the last
/// cached response. Exactly one network attempt per call.
pub struct ConditionalFetcher {
    transport: Arc<dyn HttpTransport>,
    cache: Arc<dyn ResponseCache>,
}

impl ConditionalFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, cache: Arc<dyn ResponseCache>) -> Self {
        Self { transport, cache }
    }

    pub async fn fetch(&self, url: &str) -> Result<Fetched> {
        let cached = match self.cache.load(url).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!("Failed to load cached response for {}: {}", url, e);
                None
            }
        };

        let conditional = ConditionalHeaders::from_cached(cached.as_ref());
        debug!("Fetching {} (conditional: {})", url, !conditional.is_empty());

        let response = match self.transport.get(url, &conditional).await {
            Ok(response) => response,
            Err(e) => return Self::fall_back(url, cached, e.to_string()),
        };

        let status = StatusCode::from_u16(response.status).ok();

        if status == Some(StatusCode::NOT_MODIFIED) {
            return match cached {
                Some(cached) => {
                    info!("{} Not modified", url);
                    Ok(Fetched {
                        response: cached,
                        origin: ResponseOrigin::NotModified,
                    })
                }
                None => Err(CookerError::Fetch {
                    url: url.to_string(),
                    reason: "HTTP 304 without a cached response".to_string(),
                }),
            };
        }

        if !status.is_some_and(|s| s.is_success()) {
            let reason = match status.and_then(|s| s.canonical_reason()) {
                Some(canonical) => format!("HTTP {} {}", response.status, canonical),
                None => format!("HTTP {}", response.status),
            };
            return Self::fall_back(url, cached, reason);
        }

        // Cached as soon as it is fetched, even if the body later fails to parse
        if let Err(e) = self.cache.save(url, &response).await {
            warn!("Failed to cache response for {}: {}", url, e);
        }

        debug!("Fetched {} ({} bytes, {})", url, response.body.len(), response.encoding);
        Ok(Fetched {
            response,
            origin: ResponseOrigin::Network,
        })
    }

    fn fall_back(url: &str, cached: Option<CachedResponse>, reason: String) -> Result<Fetched> {
        match cached {
            Some(cached) => {
                warn!("{} failed ({}), using cached response", url, reason);
                Ok(Fetched {
                    response: cached,
                    origin: ResponseOrigin::StaleCache,
                })
            }
            None => Err(CookerError::Fetch {
                url: url.to_string(),
                reason,
            }),
        }
    }
}
