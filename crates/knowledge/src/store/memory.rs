//! In-process vector store.
//!
//! Exact nearest-neighbour search over every point. Used for offline runs and
//! tests; contents live only as long as the process.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use ragline_core::{AppError, AppResult, DistanceMetric};

use super::VectorStore;
use crate::types::{Collection, Hit, Point};

#[derive(Debug)]
struct MemoryCollection {
    info: Collection,
    /// Insertion order; overwrites keep their original slot
    points: Vec<Point>,
    index: HashMap<String, usize>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

fn poisoned<T>(_: T) -> AppError {
    AppError::VectorStore("memory store lock poisoned".to_string())
}

fn not_found(name: &str) -> AppError {
    AppError::VectorStore(format!("Collection '{}' not found", name))
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = dot(a, a).sqrt();
    let norm_b = dot(b, b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn manhattan_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

/// Score `point` against `query`. Similarities rank descending, distances ascending.
fn score(distance: DistanceMetric, query: &[f32], point: &[f32]) -> f32 {
    match distance {
        DistanceMetric::Cosine => cosine_similarity(query, point),
        DistanceMetric::Dot => dot(query, point),
        DistanceMetric::Euclid => euclidean_distance(query, point),
        DistanceMetric::Manhattan => manhattan_distance(query, point),
    }
}

fn higher_is_better(distance: DistanceMetric) -> bool {
    matches!(distance, DistanceMetric::Cosine | DistanceMetric::Dot)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    fn store_name(&self) -> &str {
        "memory"
    }

    async fn describe_collection(&self, name: &str) -> AppResult<Option<Collection>> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections.get(name).map(|c| c.info.clone()))
    }

    async fn create_collection(&self, collection: &Collection) -> AppResult<()> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        if collections.contains_key(&collection.name) {
            return Err(AppError::VectorStore(format!(
                "Collection '{}' already exists",
                collection.name
            )));
        }
        collections.insert(
            collection.name.clone(),
            MemoryCollection {
                info: collection.clone(),
                points: Vec::new(),
                index: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> AppResult<bool> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        Ok(collections.remove(name).is_some())
    }

    async fn list_collections(&self) -> AppResult<Vec<String>> {
        let collections = self.collections.read().map_err(poisoned)?;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> AppResult<()> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| not_found(collection))?;

        // Reject the whole batch before touching anything
        let expected = target.info.dimensionality;
        if let Some(bad) = points.iter().find(|p| p.vector.len() != expected) {
            return Err(AppError::DimensionMismatch {
                collection: collection.to_string(),
                expected,
                actual: bad.vector.len(),
            });
        }

        for point in points {
            match target.index.get(&point.id) {
                Some(&slot) => target.points[slot] = point,
                None => {
                    target.index.insert(point.id.clone(), target.points.len());
                    target.points.push(point);
                }
            }
        }
        Ok(())
    }

    async fn search(&self, collection: &str, vector: &[f32], top_k: usize) -> AppResult<Vec<Hit>> {
        let collections = self.collections.read().map_err(poisoned)?;
        let target = collections
            .get(collection)
            .ok_or_else(|| not_found(collection))?;

        if vector.len() != target.info.dimensionality {
            return Err(AppError::DimensionMismatch {
                collection: collection.to_string(),
                expected: target.info.dimensionality,
                actual: vector.len(),
            });
        }

        let distance = target.info.distance;
        let mut scored: Vec<(f32, &Point)> = target
            .points
            .iter()
            .map(|p| (score(distance, vector, &p.vector), p))
            .collect();

        // Stable sort: ties keep insertion order
        if higher_is_better(distance) {
            scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        } else {
            scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        }

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, p)| Hit {
                id: p.id.clone(),
                score,
                text: p.payload.text.clone(),
                source: p.payload.source.clone(),
                section: p.payload.section.clone(),
            })
            .collect())
    }

    async fn count(&self, collection: &str) -> AppResult<usize> {
        let collections = self.collections.read().map_err(poisoned)?;
        collections
            .get(collection)
            .map(|c| c.points.len())
            .ok_or_else(|| not_found(collection))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkPayload;

    fn collection(name: &str, dims: usize, distance: DistanceMetric) -> Collection {
        Collection {
            name: name.to_string(),
            dimensionality: dims,
            distance,
        }
    }

    fn point(id: &str, vector: Vec<f32>) -> Point {
        Point {
            id: id.to_string(),
            vector,
            payload: ChunkPayload {
                text: format!("text of {}", id),
                source: "doc.md".to_string(),
                section: "1/1".to_string(),
                position: 0,
            },
        }
    }

    #[tokio::test]
    async fn test_cosine_ranking_and_top_k() {
        let store = MemoryStore::new();
        store
            .create_collection(&collection("docs", 2, DistanceMetric::Cosine))
            .await
            .unwrap();
        store
            .upsert(
                "docs",
                vec![
                    point("far", vec![0.0, 1.0]),
                    point("near", vec![1.0, 0.1]),
                    point("exact", vec![2.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store.search("docs", &[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near"]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_euclid_ranks_ascending() {
        let store = MemoryStore::new();
        store
            .create_collection(&collection("docs", 1, DistanceMetric::Euclid))
            .await
            .unwrap();
        store
            .upsert("docs", vec![point("a", vec![5.0]), point("b", vec![1.5])])
            .await
            .unwrap();

        let hits = store.search("docs", &[1.0], 5).await.unwrap();
        assert_eq!(hits[0].id, "b");
        assert!((hits[0].score - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_id() {
        let store = MemoryStore::new();
        store
            .create_collection(&collection("docs", 2, DistanceMetric::Dot))
            .await
            .unwrap();
        store
            .upsert("docs", vec![point("a", vec![1.0, 0.0]), point("b", vec![0.0, 1.0])])
            .await
            .unwrap();
        store
            .upsert("docs", vec![point("a", vec![0.5, 0.5])])
            .await
            .unwrap();

        assert_eq!(store.count("docs").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_ties_keep_insertion_order() {
        let store = MemoryStore::new();
        store
            .create_collection(&collection("docs", 2, DistanceMetric::Cosine))
            .await
            .unwrap();
        store
            .upsert(
                "docs",
                vec![
                    point("first", vec![1.0, 1.0]),
                    point("second", vec![2.0, 2.0]),
                    point("third", vec![3.0, 3.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store.search("docs", &[1.0, 1.0], 3).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_wrong_dimension_rejected() {
        let store = MemoryStore::new();
        store
            .create_collection(&collection("docs", 3, DistanceMetric::Cosine))
            .await
            .unwrap();

        match store.upsert("docs", vec![point("a", vec![1.0, 2.0])]).await {
            Err(AppError::DimensionMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("expected DimensionMismatch, got {:?}", other),
        }
        assert_eq!(store.count("docs").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_and_describe() {
        let store = MemoryStore::new();
        assert!(store.describe_collection("docs").await.unwrap().is_none());
        store
            .create_collection(&collection("docs", 3, DistanceMetric::Cosine))
            .await
            .unwrap();
        assert_eq!(
            store.describe_collection("docs").await.unwrap().unwrap().dimensionality,
            3
        );
        assert!(store.delete_collection("docs").await.unwrap());
        assert!(!store.delete_collection("docs").await.unwrap());
    }

    #[test]
    fn test_cosine_zero_norm() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
