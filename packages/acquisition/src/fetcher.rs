//! Paginated search for one sampling point.
//!
//! A search circle yields at most [`DEFAULT_MAX_PAGES`] pages of results.
//! Continuation tokens are not usable as soon as they are issued: asking
//! for the next page too early makes the API answer `INVALID_REQUEST`, so
//! the fetcher always waits [`DEFAULT_PAGE_DELAY`] before following one.

use std::time::Duration;

use venue_map_places_models::RawPlaceRecord;

use crate::api::{ApiError, PageQuery, PlacesApi};

/// Wait between receiving a continuation token and using it.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(10);

/// Pages per location (the API caps a search at 60 results, 20 per page).
pub const DEFAULT_MAX_PAGES: u32 = 3;

/// Ordered result pages of one search, already normalized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedPages {
    pages: Vec<Vec<RawPlaceRecord>>,
    malformed: u64,
}

impl FetchedPages {
    /// The pages in the order they were received.
    #[must_use]
    pub fn pages(&self) -> &[Vec<RawPlaceRecord>] {
        &self.pages
    }

    /// Number of pages received.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Total records across all pages.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }

    /// Raw results that could not be normalized and were skipped.
    #[must_use]
    pub const fn malformed(&self) -> u64 {
        self.malformed
    }

    /// Concatenates the pages in order.
    #[must_use]
    pub fn into_records(self) -> Vec<RawPlaceRecord> {
        self.pages.into_iter().flatten().collect()
    }

    fn push_page(&mut self, raw: &[serde_json::Value]) {
        let mut records = Vec::with_capacity(raw.len());
        for value in raw {
            if let Some(record) = normalize_place(value) {
                records.push(record);
            } else {
                log::debug!("Skipping malformed place result: {value}");
                self.malformed += 1;
            }
        }
        self.pages.push(records);
    }
}

/// Result of fetching one sampling point.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Every page was fetched.
    Complete(FetchedPages),
    /// A call failed. Pages received before the fault are kept in
    /// `partial`.
    Failed {
        /// The fault that stopped pagination.
        fault: ApiError,
        /// Pages received before the fault.
        partial: FetchedPages,
    },
}

/// Runs the paginated search protocol against a [`PlacesApi`].
pub struct PlacesFetcher<A> {
    api: A,
    page_delay: Duration,
    max_pages: u32,
}

impl<A: PlacesApi> PlacesFetcher<A> {
    /// Creates a fetcher with the default delay and page cap.
    #[must_use]
    pub const fn new(api: A) -> Self {
        Self {
            api,
            page_delay: DEFAULT_PAGE_DELAY,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Overrides the wait before following a continuation token. Waits
    /// shorter than [`DEFAULT_PAGE_DELAY`] are raised to it.
    #[must_use]
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay.max(DEFAULT_PAGE_DELAY);
        self
    }

    /// Overrides the page cap, kept within `1..=DEFAULT_MAX_PAGES`.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.clamp(1, DEFAULT_MAX_PAGES);
        self
    }

    /// The underlying API client.
    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Page cap per location.
    #[must_use]
    pub const fn max_pages(&self) -> u32 {
        self.max_pages
    }

    /// Searches the circle around `(latitude, longitude)` and follows
    /// continuation tokens until none is left or the page cap is reached.
    ///
    /// Never returns an error: faults are folded into
    /// [`FetchOutcome::Failed`] so the caller decides what to do with the
    /// point.
    pub async fn fetch(&self, latitude: f64, longitude: f64, radius_meters: f64) -> FetchOutcome {
        let mut fetched = FetchedPages::default();
        let mut query = PageQuery::Nearby {
            latitude,
            longitude,
            radius_meters,
        };

        loop {
            let page = match self.api.search(&query).await {
                Ok(page) => page,
                Err(fault) => {
                    return FetchOutcome::Failed {
                        fault,
                        partial: fetched,
                    };
                }
            };

            fetched.push_page(&page.results);
            log::debug!(
                "({latitude}, {longitude}) page {}: {} results",
                fetched.page_count(),
                page.results.len()
            );

            let Some(token) = page.next_page_token else {
                break;
            };

            if fetched.page_count() >= self.max_pages as usize {
                log::debug!(
                    "({latitude}, {longitude}) reached the {}-page cap, dropping token",
                    self.max_pages
                );
                break;
            }

            tokio::time::sleep(self.page_delay).await;
            query = PageQuery::Continuation { token };
        }

        FetchOutcome::Complete(fetched)
    }
}

/// Restricts a raw search result to the fields the pipeline keeps.
///
/// Returns `None` when the result has no identifier or no usable
/// coordinates.
#[must_use]
pub fn normalize_place(value: &serde_json::Value) -> Option<RawPlaceRecord> {
    let id = value
        .get("place_id")
        .or_else(|| value.get("id"))
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())?
        .to_string();

    let location = value.get("geometry")?.get("location")?;
    let lat = location.get("lat")?.as_f64().filter(|v| v.is_finite())?;
    let lng = location.get("lng")?.as_f64().filter(|v| v.is_finite())?;

    let name = value
        .get("name")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();

    let price_level = value
        .get("price_level")
        .and_then(serde_json::Value::as_u64)
        .and_then(|v| u8::try_from(v).ok());
    let rating = value.get("rating").and_then(serde_json::Value::as_f64);
    let rating_count = value
        .get("user_ratings_total")
        .and_then(serde_json::Value::as_u64);

    let types = value
        .get("types")
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(serde_json::Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(RawPlaceRecord {
        id,
        name,
        lat,
        lng,
        price_level,
        rating,
        rating_count,
        types,
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::{ScriptedApi, page, status_fault};
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn follows_tokens_with_delay_until_exhausted() {
        let api = ScriptedApi::new(vec![
            page(&["a", "b"], Some("t1")),
            page(&["c"], Some("t2")),
            page(&["d"], None),
        ]);
        let fetcher = PlacesFetcher::new(api);

        let outcome = fetcher.fetch(48.85, 2.35, 250.0).await;
        let FetchOutcome::Complete(pages) = outcome else {
            panic!("expected a complete fetch");
        };
        assert_eq!(pages.page_count(), 3);

        let calls = fetcher.api().calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(calls[0].0, PageQuery::Nearby { .. }));
        assert_eq!(
            calls[1].0,
            PageQuery::Continuation {
                token: "t1".to_string()
            }
        );
        assert_eq!(
            calls[2].0,
            PageQuery::Continuation {
                token: "t2".to_string()
            }
        );
        assert!(calls[1].1 - calls[0].1 >= DEFAULT_PAGE_DELAY);
        assert!(calls[2].1 - calls[1].1 >= DEFAULT_PAGE_DELAY);

        let ids: Vec<String> = pages.into_records().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_page_cap_even_with_token() {
        let api = ScriptedApi::new(vec![
            page(&["a"], Some("t1")),
            page(&["b"], Some("t2")),
            page(&["c"], Some("t3")),
            page(&["never"], None),
        ]);
        let fetcher = PlacesFetcher::new(api);

        let FetchOutcome::Complete(pages) = fetcher.fetch(0.0, 0.0, 100.0).await else {
            panic!("expected a complete fetch");
        };
        assert_eq!(pages.record_count(), 3);
        assert_eq!(fetcher.api().calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn single_page_issues_one_call_without_waiting() {
        let api = ScriptedApi::new(vec![page(&["a"], None)]);
        let fetcher = PlacesFetcher::new(api);
        let start = tokio::time::Instant::now();

        let FetchOutcome::Complete(pages) = fetcher.fetch(0.0, 0.0, 100.0).await else {
            panic!("expected a complete fetch");
        };
        assert_eq!(pages.page_count(), 1);
        assert_eq!(fetcher.api().calls().len(), 1);
        assert!(tokio::time::Instant::now() - start < DEFAULT_PAGE_DELAY);
    }

    #[tokio::test(start_paused = true)]
    async fn fault_on_later_page_keeps_earlier_pages() {
        let api = ScriptedApi::new(vec![
            page(&["a", "b"], Some("t1")),
            status_fault("INVALID_REQUEST"),
        ]);
        let fetcher = PlacesFetcher::new(api);

        match fetcher.fetch(0.0, 0.0, 100.0).await {
            FetchOutcome::Failed { fault, partial } => {
                assert!(fault.to_string().contains("INVALID_REQUEST"));
                assert_eq!(partial.record_count(), 2);
            }
            FetchOutcome::Complete(_) => panic!("expected a failed fetch"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fault_on_first_page_has_no_records() {
        let fetcher = PlacesFetcher::new(ScriptedApi::new(vec![status_fault("OVER_QUERY_LIMIT")]));
        match fetcher.fetch(0.0, 0.0, 100.0).await {
            FetchOutcome::Failed { partial, .. } => assert_eq!(partial.page_count(), 0),
            FetchOutcome::Complete(_) => panic!("expected a failed fetch"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn custom_delay_and_cap_are_honored() {
        let api = ScriptedApi::new(vec![page(&["a"], Some("t1")), page(&["b"], Some("t2"))]);
        let fetcher = PlacesFetcher::new(api)
            .with_page_delay(Duration::from_secs(15))
            .with_max_pages(2);

        let FetchOutcome::Complete(pages) = fetcher.fetch(0.0, 0.0, 100.0).await else {
            panic!("expected a complete fetch");
        };
        assert_eq!(pages.page_count(), 2);
        let calls = fetcher.api().calls();
        assert!(calls[1].1 - calls[0].1 >= Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_and_cap_cannot_exceed_api_limits() {
        let api = ScriptedApi::new(
            (0..6)
                .map(|i| page(&[format!("p{i}").as_str()], Some(format!("t{i}").as_str())))
                .collect(),
        );
        let fetcher = PlacesFetcher::new(api)
            .with_page_delay(Duration::ZERO)
            .with_max_pages(6);
        assert_eq!(fetcher.max_pages(), DEFAULT_MAX_PAGES);

        let FetchOutcome::Complete(pages) = fetcher.fetch(0.0, 0.0, 100.0).await else {
            panic!("expected a complete fetch");
        };
        assert_eq!(pages.page_count(), 3);

        let calls = fetcher.api().calls();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= DEFAULT_PAGE_DELAY);
        }

        assert_eq!(
            PlacesFetcher::new(ScriptedApi::default())
                .with_max_pages(0)
                .max_pages(),
            1
        );
    }

    #[test]
    fn normalizes_to_the_kept_fields() {
        let value = serde_json::json!({
            "place_id": "ChIJ123",
            "name": "Le Comptoir",
            "geometry": {"location": {"lat": 48.852, "lng": 2.338}, "viewport": {}},
            "price_level": 2,
            "rating": 4.3,
            "user_ratings_total": 1520,
            "types": ["restaurant", "food", "point_of_interest", "establishment"],
            "vicinity": "9 Carrefour de l'Odéon",
            "opening_hours": {"open_now": true}
        });
        let record = normalize_place(&value).unwrap();
        assert_eq!(record.id, "ChIJ123");
        assert_eq!(record.name, "Le Comptoir");
        assert_eq!(record.price_level, Some(2));
        assert_eq!(record.rating_count, Some(1520));
        assert!(record.types.contains("establishment"));
        assert_eq!(record.types.len(), 4);
    }

    #[test]
    fn rejects_results_without_id_or_location() {
        assert!(normalize_place(&serde_json::json!({"name": "x"})).is_none());
        assert!(
            normalize_place(&serde_json::json!({
                "place_id": "a",
                "geometry": {"location": {"lat": "north"}}
            }))
            .is_none()
        );
    }

    #[test]
    fn counts_malformed_results_per_page() {
        let mut pages = FetchedPages::default();
        pages.push_page(&[
            super::test_support::place("a", 1.0, 2.0),
            serde_json::json!({"name": "no id"}),
        ]);
        assert_eq!(pages.record_count(), 1);
        assert_eq!(pages.malformed(), 1);
    }
}
