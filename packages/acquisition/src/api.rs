//! Places search API client.
//!
//! [`PlacesApi`] is the seam between the fetcher and the network: the
//! production implementation ([`HttpPlacesApi`]) talks to a Nearby Search
//! style endpoint, tests substitute scripted fakes. One call returns one
//! page of raw results plus an optional continuation token.

use std::str::FromStr as _;
use std::time::Duration;

use async_trait::async_trait;
use venue_map_places_models::ApiStatus;
use venue_map_places_models::study::ApiSettings;

/// Faults raised by a single search call.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Network, timeout, or HTTP status failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status
    /// (`INVALID_REQUEST`, `OVER_QUERY_LIMIT`, ...).
    #[error("API returned {status}{}", message_suffix(.message))]
    Status {
        /// Raw status string from the response.
        status: String,
        /// Optional `error_message` from the response.
        message: Option<String>,
    },

    /// The response body did not have the expected shape.
    #[error("Malformed response: {message}")]
    Malformed {
        /// Description of what was wrong.
        message: String,
    },
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

/// What to ask the API for.
#[derive(Debug, Clone, PartialEq)]
pub enum PageQuery {
    /// First page of a circular search.
    Nearby {
        /// Circle center latitude.
        latitude: f64,
        /// Circle center longitude.
        longitude: f64,
        /// Circle radius in meters.
        radius_meters: f64,
    },
    /// Follow-up page identified by a token from the previous page.
    Continuation {
        /// Token returned by the previous page.
        token: String,
    },
}

/// One page of raw search results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchPage {
    /// Raw result objects, normalized later by the fetcher.
    pub results: Vec<serde_json::Value>,
    /// Token for the next page, if the API has more results.
    pub next_page_token: Option<String>,
}

/// A places search backend.
#[async_trait]
pub trait PlacesApi: Send + Sync {
    /// Issues one search call.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on network, status, or response-shape faults.
    async fn search(&self, query: &PageQuery) -> Result<SearchPage, ApiError>;
}

/// HTTP client for a Nearby Search style endpoint.
pub struct HttpPlacesApi {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    place_type: Option<String>,
    keyword: Option<String>,
    language: Option<String>,
}

impl HttpPlacesApi {
    /// Creates a client for `endpoint` authenticated with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] if the HTTP client cannot be built.
    pub fn new(endpoint: &str, api_key: String, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("venue_map/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key,
            place_type: None,
            keyword: None,
            language: None,
        })
    }

    /// Builds a client from study settings.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] if the HTTP client cannot be built.
    pub fn from_settings(settings: &ApiSettings, api_key: String) -> Result<Self, ApiError> {
        let mut api = Self::new(
            &settings.endpoint,
            api_key,
            Duration::from_secs(settings.timeout_secs),
        )?;
        api.place_type.clone_from(&settings.place_type);
        api.keyword.clone_from(&settings.keyword);
        api.language.clone_from(&settings.language);
        Ok(api)
    }

    fn query_params(&self, query: &PageQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![("key", self.api_key.clone())];
        match query {
            PageQuery::Nearby {
                latitude,
                longitude,
                radius_meters,
            } => {
                params.push(("location", format!("{latitude},{longitude}")));
                params.push(("radius", radius_meters.to_string()));
                if let Some(place_type) = &self.place_type {
                    params.push(("type", place_type.clone()));
                }
                if let Some(keyword) = &self.keyword {
                    params.push(("keyword", keyword.clone()));
                }
                if let Some(language) = &self.language {
                    params.push(("language", language.clone()));
                }
            }
            PageQuery::Continuation { token } => {
                params.push(("pagetoken", token.clone()));
            }
        }
        params
    }
}

#[async_trait]
impl PlacesApi for HttpPlacesApi {
    async fn search(&self, query: &PageQuery) -> Result<SearchPage, ApiError> {
        log::debug!("Places search: {query:?}");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&self.query_params(query))
            .send()
            .await?
            .error_for_status()?;
        let body: serde_json::Value = response.json().await?;

        parse_response(&body)
    }
}

/// Interprets a search response body.
///
/// `OK` and `ZERO_RESULTS` yield a page; any other status becomes
/// [`ApiError::Status`].
///
/// # Errors
///
/// Returns [`ApiError`] for failure statuses or a body without a status.
pub fn parse_response(body: &serde_json::Value) -> Result<SearchPage, ApiError> {
    let raw_status = body
        .get("status")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| ApiError::Malformed {
            message: "response has no status field".to_string(),
        })?;

    let success = ApiStatus::from_str(raw_status).is_ok_and(ApiStatus::is_success);
    if !success {
        return Err(ApiError::Status {
            status: raw_status.to_string(),
            message: body
                .get("error_message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
        });
    }

    let results = match body.get("results") {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Array(items)) => items.clone(),
        Some(other) => {
            return Err(ApiError::Malformed {
                message: format!("results is not an array: {other}"),
            });
        }
    };

    let next_page_token = body
        .get("next_page_token")
        .and_then(serde_json::Value::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_string);

    Ok(SearchPage {
        results,
        next_page_token,
    })
}
