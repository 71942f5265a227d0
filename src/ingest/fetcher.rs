//! Batch fetcher: chunked provider lookups.
//!
//! Splits id lists into the provider's per-request ceilings, issues one
//! request per chunk, and flattens every response into a single ordered
//! sequence with one slot per requested id.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::traits::HistoryProvider;
use crate::error::FetchError;
use crate::model::Play;
use crate::spotify::{Resource, adapter, dto, timestamp_to_cursor};

/// Result of a chunked lookup.
///
/// `records` always has one slot per requested id, in request order.
/// A slot is `None` when the provider returned `null` for that id, when the
/// record did not match the expected shape, or when its chunk failed.
#[derive(Debug)]
pub struct Batch<T> {
    pub records: Vec<Option<T>>,
    /// Ids whose chunk request failed or came back malformed
    pub failed: BTreeSet<String>,
    /// Number of requests issued
    pub requests: usize,
}

impl<T> Batch<T> {
    /// Whether every chunk was fetched.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// The records, or an error if any chunk failed.
    pub fn complete(self) -> Result<Vec<Option<T>>, FetchError> {
        if self.failed.is_empty() {
            Ok(self.records)
        } else {
            Err(FetchError::Incomplete {
                failed: self.failed.len(),
                requested: self.records.len(),
            })
        }
    }
}

/// Fetches plays and metadata through a [`HistoryProvider`].
pub struct BatchFetcher<'a, P: ?Sized> {
    provider: &'a P,
}

impl<'a, P: HistoryProvider + ?Sized> BatchFetcher<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    /// Fetch `ids` from `resource`, one request per chunk.
    ///
    /// Never fails as a whole: failed chunks leave their slots empty and
    /// their ids in [`Batch::failed`].
    pub async fn fetch_entities<T: DeserializeOwned>(
        &self,
        resource: Resource,
        ids: &[String],
    ) -> Batch<T> {
        let mut batch = Batch {
            records: Vec::with_capacity(ids.len()),
            failed: BTreeSet::new(),
            requests: 0,
        };

        for chunk in ids.chunks(resource.chunk_size()) {
            batch.requests += 1;
            tracing::debug!(%resource, ids = chunk.len(), "Fetching chunk");

            let result = self
                .provider
                .get_entities(resource, chunk)
                .await
                .and_then(|response| flatten(response, chunk.len()));

            match result {
                Ok(values) => {
                    batch
                        .records
                        .extend(values.into_iter().map(|v| parse_record(resource, v)));
                }
                Err(e) => {
                    tracing::warn!(%resource, ids = chunk.len(), error = %e, "Chunk fetch failed");
                    batch.failed.extend(chunk.iter().cloned());
                    batch.records.extend(chunk.iter().map(|_| None));
                }
            }
        }

        batch
    }

    /// Fetch the most recent plays after the stored watermark.
    ///
    /// `after` is a stored ISO-8601 timestamp. `None`, or a timestamp that
    /// cannot be parsed, asks for the provider's default window.
    pub async fn fetch_recent_plays(&self, after: Option<&str>) -> Result<Vec<Play>, FetchError> {
        let cursor = after.and_then(|ts| {
            let cursor = timestamp_to_cursor(ts);
            if cursor.is_none() {
                tracing::warn!(watermark = ts, "Unparseable watermark, fetching default window");
            }
            cursor
        });

        let response = self.provider.recently_played(cursor).await?;
        let total = response.items.len();
        let plays: Vec<Play> = response
            .items
            .into_iter()
            .filter_map(adapter::to_play)
            .collect();

        if plays.len() < total {
            tracing::info!(dropped = total - plays.len(), "Ignoring plays without a track id");
        }
        Ok(plays)
    }
}

/// Deserialize one slot. `null` and shape mismatches become `None`.
fn parse_record<T: DeserializeOwned>(resource: Resource, value: Value) -> Option<T> {
    if value.is_null() {
        return None;
    }
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(%resource, error = %e, "Discarding record with unexpected shape");
            None
        }
    }
}

/// Flatten a chunk response into its list of records.
///
/// Accepts a bare list or an object with exactly one key whose value is a
/// list. The list must have exactly `expected` elements.
pub fn flatten(response: dto::ChunkResponse, expected: usize) -> Result<Vec<Value>, FetchError> {
    let values = match response {
        dto::ChunkResponse::Bare(values) => values,
        dto::ChunkResponse::Keyed(map) => {
            if map.len() != 1 {
                return Err(FetchError::Malformed(format!(
                    "expected a single top-level key, found {}",
                    map.len()
                )));
            }
            match map.into_values().next() {
                Some(Value::Array(values)) => values,
                _ => {
                    return Err(FetchError::Malformed(
                        "top-level value is not a list".to_string(),
                    ));
                }
            }
        }
    };

    if values.len() != expected {
        return Err(FetchError::Malformed(format!(
            "expected {} records, got {}",
            expected,
            values.len()
        )));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::ingest::traits::mocks::MockProvider;
    use crate::test_utils::{artist_json, track_json};

    fn track_ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("T{:03}", i)).collect()
    }

    fn catalog_of(ids: &[String]) -> MockProvider {
        ids.iter().fold(MockProvider::new(), |mock, id| {
            mock.with_entity(Resource::Tracks, track_json(id, "A1", "AL1"))
        })
    }

    #[tokio::test]
    async fn test_chunking_keeps_order_and_length() {
        let ids = track_ids(130);
        let mock = catalog_of(&ids);
        let fetcher = BatchFetcher::new(&mock);

        let batch = fetcher
            .fetch_entities::<dto::TrackObject>(Resource::Tracks, &ids)
            .await;

        let sizes: Vec<usize> = mock
            .requests_for(Resource::Tracks)
            .iter()
            .map(Vec::len)
            .collect();
        assert_eq!(sizes, vec![50, 50, 30]);
        assert_eq!(batch.requests, 3);
        assert!(batch.is_complete());

        let records = batch.complete().unwrap();
        assert_eq!(records.len(), 130);
        for (id, record) in ids.iter().zip(&records) {
            assert_eq!(&record.as_ref().unwrap().id, id);
        }
    }

    #[tokio::test]
    async fn test_bare_list_responses() {
        let ids = track_ids(3);
        let mut mock = catalog_of(&ids);
        mock.bare = true;

        let batch = BatchFetcher::new(&mock)
            .fetch_entities::<dto::TrackObject>(Resource::Tracks, &ids)
            .await;
        assert_eq!(batch.complete().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_null_records_are_absent_slots() {
        let mock = MockProvider::new().with_entity(Resource::Artists, artist_json("A1", &[]));
        let ids = vec!["A0".to_string(), "A1".to_string()];

        let batch = BatchFetcher::new(&mock)
            .fetch_entities::<dto::ArtistObject>(Resource::Artists, &ids)
            .await;

        assert!(batch.is_complete());
        let records = batch.complete().unwrap();
        assert!(records[0].is_none());
        assert_eq!(records[1].as_ref().unwrap().id, "A1");
    }

    #[tokio::test]
    async fn test_failed_chunk_is_isolated() {
        let ids = track_ids(60);
        let mut mock = catalog_of(&ids);
        mock.failing_ids.insert("T055".to_string());

        let batch = BatchFetcher::new(&mock)
            .fetch_entities::<dto::TrackObject>(Resource::Tracks, &ids)
            .await;

        assert_eq!(batch.records.len(), 60);
        assert!(batch.records[..50].iter().all(Option::is_some));
        assert!(batch.records[50..].iter().all(Option::is_none));
        assert_eq!(batch.failed.len(), 10);
        assert!(batch.failed.contains("T050"));
        assert!(matches!(
            batch.complete(),
            Err(FetchError::Incomplete {
                failed: 10,
                requested: 60
            })
        ));
    }

    #[tokio::test]
    async fn test_malformed_response_fails_chunk() {
        let ids = track_ids(2);
        let mut mock = catalog_of(&ids);
        mock.malformed_resources.insert(Resource::Tracks);

        let batch = BatchFetcher::new(&mock)
            .fetch_entities::<dto::TrackObject>(Resource::Tracks, &ids)
            .await;
        assert_eq!(batch.failed.len(), 2);
        assert!(batch.records.iter().all(Option::is_none));
    }

    #[tokio::test]
    async fn test_empty_ids_issue_no_requests() {
        let mock = MockProvider::new();
        let batch = BatchFetcher::new(&mock)
            .fetch_entities::<dto::AlbumObject>(Resource::Albums, &[])
            .await;
        assert_eq!(batch.requests, 0);
        assert!(mock.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_flatten_rejects_length_mismatch() {
        let response = dto::ChunkResponse::Bare(vec![json!({"id": "T1"})]);
        assert!(matches!(flatten(response, 2), Err(FetchError::Malformed(_))));
    }

    #[test]
    fn test_flatten_rejects_non_list_value() {
        let mut map = BTreeMap::new();
        map.insert("tracks".to_string(), json!({"id": "T1"}));
        let response = dto::ChunkResponse::Keyed(map);
        assert!(matches!(flatten(response, 1), Err(FetchError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_recent_plays_with_watermark() {
        let mock = MockProvider::new()
            .with_play("2024-01-01T00:00:00Z", "T1")
            .with_play("2024-01-02T00:00:00Z", "T2");
        let fetcher = BatchFetcher::new(&mock);

        let plays = fetcher
            .fetch_recent_plays(Some("2024-01-01T00:00:00Z"))
            .await
            .unwrap();
        assert_eq!(plays.len(), 1);
        assert_eq!(plays[0].track_id, "T2");
        assert_eq!(
            mock.history_requests.lock().unwrap().as_slice(),
            &[Some(1_704_067_200_000)]
        );
    }

    #[tokio::test]
    async fn test_unparseable_watermark_fetches_default_window() {
        let mock = MockProvider::new().with_play("2024-01-01T00:00:00Z", "T1");
        let plays = BatchFetcher::new(&mock)
            .fetch_recent_plays(Some("not a timestamp"))
            .await
            .unwrap();

        assert_eq!(plays.len(), 1);
        assert_eq!(mock.history_requests.lock().unwrap().as_slice(), &[None]);
    }
}
