//! Qdrant vector store over its REST API.
//!
//! Qdrant API: https://qdrant.tech/documentation/interfaces/

use std::time::Duration;

use async_trait::async_trait;
use ragline_core::{AppError, AppResult, DistanceMetric};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::VectorStore;
use crate::types::{ChunkPayload, Collection, Hit, Point};

#[derive(Debug, Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    config: CollectionConfig,
}

#[derive(Debug, Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Debug, Deserialize)]
struct CollectionParams {
    vectors: VectorParams,
}

#[derive(Debug, Deserialize)]
struct VectorParams {
    size: usize,
    distance: String,
}

#[derive(Debug, Deserialize)]
struct CollectionList {
    collections: Vec<CollectionName>,
}

#[derive(Debug, Deserialize)]
struct CollectionName {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f32,
    #[serde(default)]
    payload: Option<ChunkPayload>,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: usize,
}

fn distance_name(distance: DistanceMetric) -> &'static str {
    match distance {
        DistanceMetric::Cosine => "Cosine",
        DistanceMetric::Dot => "Dot",
        DistanceMetric::Euclid => "Euclid",
        DistanceMetric::Manhattan => "Manhattan",
    }
}

/// Pull `(expected, actual)` out of a dimension error message such as
/// `"Vector dimension error: expected dim: 1024, got 768"`.
fn parse_dimension_error(body: &str) -> Option<(usize, usize)> {
    let lower = body.to_lowercase();
    if !lower.contains("dimension") {
        return None;
    }

    let number_after = |marker: &str| -> Option<usize> {
        let start = lower.find(marker)? + marker.len();
        let digits: String = lower[start..]
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    };

    Some((
        number_after("expected dim:").unwrap_or(0),
        number_after("got").unwrap_or(0),
    ))
}

fn point_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Qdrant store client.
#[derive(Debug, Clone)]
pub struct QdrantStore {
    client: Client,
    base_url: String,
}

impl QdrantStore {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            AppError::VectorStore(format!("Failed to create HTTP client for Qdrant: {}", e))
        })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self, name: &str) -> String {
        format!("{}/collections/{}", self.base_url, name)
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> AppResult<reqwest::Response> {
        request
            .send()
            .await
            .map_err(|e| AppError::VectorStore(format!("Qdrant {} failed: {}", what, e)))
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        what: &str,
    ) -> AppResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::VectorStore(format!(
                "Qdrant {} failed ({}): {}",
                what, status, body
            )));
        }

        let parsed: QdrantResponse<T> = response.json().await.map_err(|e| {
            AppError::VectorStore(format!("Failed to parse Qdrant {} response: {}", what, e))
        })?;
        Ok(parsed.result)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn store_name(&self) -> &str {
        "qdrant"
    }

    #[instrument(skip(self))]
    async fn describe_collection(&self, name: &str) -> AppResult<Option<Collection>> {
        let response = self
            .send(self.client.get(self.collection_url(name)), "describe")
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let info: CollectionInfo = Self::parse(response, "describe").await?;
        let params = info.config.params.vectors;
        let distance = DistanceMetric::parse(&params.distance).ok_or_else(|| {
            AppError::VectorStore(format!(
                "Collection '{}' uses unsupported distance '{}'",
                name, params.distance
            ))
        })?;

        Ok(Some(Collection {
            name: name.to_string(),
            dimensionality: params.size,
            distance,
        }))
    }

    #[instrument(skip(self), fields(name = %collection.name))]
    async fn create_collection(&self, collection: &Collection) -> AppResult<()> {
        let body = json!({
            "vectors": {
                "size": collection.dimensionality,
                "distance": distance_name(collection.distance),
            }
        });
        let response = self
            .send(
                self.client.put(self.collection_url(&collection.name)).json(&body),
                "create collection",
            )
            .await?;
        let _: Value = Self::parse(response, "create collection").await?;

        debug!(
            "Created Qdrant collection '{}' ({} dims, {})",
            collection.name, collection.dimensionality, collection.distance
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_collection(&self, name: &str) -> AppResult<bool> {
        let response = self
            .send(self.client.delete(self.collection_url(name)), "delete collection")
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let deleted: bool = Self::parse(response, "delete collection").await?;
        Ok(deleted)
    }

    async fn list_collections(&self) -> AppResult<Vec<String>> {
        let response = self
            .send(
                self.client.get(format!("{}/collections", self.base_url)),
                "list collections",
            )
            .await?;
        let list: CollectionList = Self::parse(response, "list collections").await?;
        Ok(list.collections.into_iter().map(|c| c.name).collect())
    }

    #[instrument(skip(self, points), fields(points = points.len()))]
    async fn upsert(&self, collection: &str, points: Vec<Point>) -> AppResult<()> {
        let actual = points.first().map(|p| p.vector.len()).unwrap_or(0);
        let body = json!({
            "points": points
                .into_iter()
                .map(|p| json!({ "id": p.id, "vector": p.vector, "payload": p.payload }))
                .collect::<Vec<_>>()
        });

        let response = self
            .send(
                self.client
                    .put(format!("{}/points?wait=true", self.collection_url(collection)))
                    .json(&body),
                "upsert",
            )
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST {
            if let Some((expected, got)) = parse_dimension_error(&body) {
                return Err(AppError::DimensionMismatch {
                    collection: collection.to_string(),
                    expected,
                    actual: if got == 0 { actual } else { got },
                });
            }
        }

        Err(AppError::Upsert {
            collection: collection.to_string(),
            reason: format!("{}: {}", status, body),
        })
    }

    #[instrument(skip(self, vector), fields(dims = vector.len()))]
    async fn search(&self, collection: &str, vector: &[f32], top_k: usize) -> AppResult<Vec<Hit>> {
        let body = json!({ "vector": vector, "limit": top_k, "with_payload": true });
        let response = self
            .send(
                self.client
                    .post(format!("{}/points/search", self.collection_url(collection)))
                    .json(&body),
                "search",
            )
            .await?;
        let scored: Vec<ScoredPoint> = Self::parse(response, "search").await?;

        Ok(scored
            .into_iter()
            .map(|p| {
                let payload = p.payload.unwrap_or(ChunkPayload {
                    text: String::new(),
                    source: String::new(),
                    section: String::new(),
                    position: 0,
                });
                Hit {
                    id: point_id(&p.id),
                    score: p.score,
                    text: payload.text,
                    source: payload.source,
                    section: payload.section,
                }
            })
            .collect())
    }

    async fn count(&self, collection: &str) -> AppResult<usize> {
        let response = self
            .send(
                self.client
                    .post(format!("{}/points/count", self.collection_url(collection)))
                    .json(&json!({ "exact": true })),
                "count",
            )
            .await?;
        let result: CountResult = Self::parse(response, "count").await?;
        Ok(result.count)
    }
}
