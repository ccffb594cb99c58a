//! Collection lifecycle on top of a [`VectorStore`].
//!
//! A collection never changes shape. When the embedding model starts
//! producing vectors of another size (or the metric changes), writes move to a
//! sibling collection named `<base>_d<size>` and the original is left as is.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ragline_core::{AppError, AppResult, DistanceMetric};
use tracing::{debug, info, warn};

use super::VectorStore;
use crate::types::{ChunkPayload, Collection, CollectionStats, Hit, Point};

/// Name of the collection that holds `size`-dimensional vectors after a migration.
pub fn migrated_name(base: &str, size: usize) -> String {
    format!("{}_d{}", base, size)
}

/// Zip parallel id, vector and payload lists into points.
pub fn points_from_parts(
    ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
    payloads: Vec<ChunkPayload>,
) -> AppResult<Vec<Point>> {
    if ids.len() != vectors.len() || ids.len() != payloads.len() {
        return Err(AppError::Knowledge(format!(
            "upsert needs equal-length inputs: {} ids, {} vectors, {} payloads",
            ids.len(),
            vectors.len(),
            payloads.len()
        )));
    }

    Ok(ids
        .into_iter()
        .zip(vectors)
        .zip(payloads)
        .map(|((id, vector), payload)| Point {
            id,
            vector,
            payload,
        })
        .collect())
}

#[derive(Debug)]
pub struct VectorStoreManager {
    store: Arc<dyn VectorStore>,
    base: String,
    active: Mutex<Option<Collection>>,
    write_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl VectorStoreManager {
    pub fn new(store: Arc<dyn VectorStore>, base: impl Into<String>) -> Self {
        Self {
            store,
            base: base.into(),
            active: Mutex::new(None),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn base_name(&self) -> &str {
        &self.base
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Collection the last `ensure_or_migrate` resolved to.
    pub fn active(&self) -> Option<Collection> {
        self.active.lock().ok().and_then(|guard| guard.clone())
    }

    fn set_active(&self, collection: &Collection) {
        if let Ok(mut guard) = self.active.lock() {
            *guard = Some(collection.clone());
        }
    }

    fn write_lock(&self, name: &str) -> AppResult<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .write_locks
            .lock()
            .map_err(|_| AppError::VectorStore("write lock table poisoned".to_string()))?;
        Ok(locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }

    /// Return a collection that accepts `size`-dimensional vectors under `distance`,
    /// creating it if needed. Never deletes or resizes anything.
    pub async fn ensure_or_migrate(
        &self,
        size: usize,
        distance: DistanceMetric,
    ) -> AppResult<Collection> {
        let wanted = Collection {
            name: self.base.clone(),
            dimensionality: size,
            distance,
        };

        let resolved = match self.store.describe_collection(&self.base).await? {
            None => {
                info!(
                    "Creating collection '{}' ({} dims, {})",
                    self.base, size, distance
                );
                self.store.create_collection(&wanted).await?;
                wanted
            }
            Some(existing) if existing == wanted => {
                debug!("Reusing collection '{}'", self.base);
                existing
            }
            Some(existing) => {
                let target = migrated_name(&self.base, size);
                warn!(
                    "Collection '{}' holds {}-dimensional {} vectors; using '{}' for {}-dimensional {} vectors",
                    self.base,
                    existing.dimensionality,
                    existing.distance,
                    target,
                    size,
                    distance
                );
                self.ensure_exact(Collection {
                    name: target,
                    dimensionality: size,
                    distance,
                })
                .await?
            }
        };

        self.set_active(&resolved);
        Ok(resolved)
    }

    async fn ensure_exact(&self, wanted: Collection) -> AppResult<Collection> {
        match self.store.describe_collection(&wanted.name).await? {
            None => {
                info!(
                    "Creating collection '{}' ({} dims, {})",
                    wanted.name, wanted.dimensionality, wanted.distance
                );
                self.store.create_collection(&wanted).await?;
                Ok(wanted)
            }
            Some(existing) if existing == wanted => Ok(existing),
            Some(existing) if existing.dimensionality != wanted.dimensionality => {
                Err(AppError::DimensionMismatch {
                    collection: existing.name,
                    expected: existing.dimensionality,
                    actual: wanted.dimensionality,
                })
            }
            Some(existing) => Err(AppError::VectorStore(format!(
                "Collection '{}' uses {} distance; cannot store {} vectors there",
                existing.name, existing.distance, wanted.distance
            ))),
        }
    }

    /// Find the collection a search with `size`-dimensional vectors should use,
    /// without creating anything.
    pub async fn resolve(
        &self,
        size: usize,
        distance: DistanceMetric,
    ) -> AppResult<Option<Collection>> {
        for name in [self.base.clone(), migrated_name(&self.base, size)] {
            if let Some(existing) = self.store.describe_collection(&name).await? {
                if existing.dimensionality == size && existing.distance == distance {
                    return Ok(Some(existing));
                }
            }
        }
        Ok(None)
    }

    /// [`Self::upsert`] from parallel lists; all three must have the same length.
    pub async fn upsert_parts(
        &self,
        collection: &Collection,
        ids: Vec<String>,
        vectors: Vec<Vec<f32>>,
        payloads: Vec<ChunkPayload>,
    ) -> AppResult<Collection> {
        let points = points_from_parts(ids, vectors, payloads)?;
        self.upsert(collection, points).await
    }

    /// Write points into `collection`; returns the collection actually written.
    ///
    /// Writes to one collection name are serialized. If the store reports a
    /// dimension mismatch (the handle went stale), the target is re-resolved
    /// through [`Self::ensure_or_migrate`] and the batch is written once more.
    pub async fn upsert(&self, collection: &Collection, points: Vec<Point>) -> AppResult<Collection> {
        if points.is_empty() {
            return Ok(collection.clone());
        }

        let size = points[0].vector.len();
        if points.iter().any(|p| p.vector.len() != size) {
            return Err(AppError::Upsert {
                collection: collection.name.clone(),
                reason: "points in one batch have different vector lengths".to_string(),
            });
        }

        let target = if size == collection.dimensionality {
            collection.clone()
        } else {
            self.ensure_or_migrate(size, collection.distance).await?
        };

        match self.write_points(&target, points.clone()).await {
            Err(AppError::DimensionMismatch {
                collection: stale,
                expected,
                actual,
            }) => {
                warn!(
                    "Collection '{}' expects {} dimensions, batch has {}; re-resolving",
                    stale, expected, actual
                );
                let migrated = self.ensure_or_migrate(size, target.distance).await?;
                self.write_points(&migrated, points).await?;
                Ok(migrated)
            }
            Err(e) => Err(e),
            Ok(()) => Ok(target),
        }
    }

    async fn write_points(&self, collection: &Collection, points: Vec<Point>) -> AppResult<()> {
        let lock = self.write_lock(&collection.name)?;
        let _guard = lock.lock().await;
        self.store.upsert(&collection.name, points).await
    }

    /// Ranked hits in the store's order. No compatible collection means no hits.
    pub async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        distance: DistanceMetric,
    ) -> AppResult<Vec<Hit>> {
        if vector.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        match self.resolve(vector.len(), distance).await? {
            Some(collection) => self.store.search(&collection.name, vector, top_k).await,
            None => {
                debug!(
                    "No collection for {}-dimensional {} vectors under '{}'",
                    vector.len(),
                    distance,
                    self.base
                );
                Ok(Vec::new())
            }
        }
    }

    /// Stats for the base collection and every migrated sibling.
    pub async fn stats(&self) -> AppResult<Vec<CollectionStats>> {
        let prefix = format!("{}_d", self.base);
        let mut names: Vec<String> = self
            .store
            .list_collections()
            .await?
            .into_iter()
            .filter(|name| *name == self.base || name.starts_with(&prefix))
            .collect();
        names.sort();

        let mut stats = Vec::with_capacity(names.len());
        for name in names {
            if let Some(collection) = self.store.describe_collection(&name).await? {
                let points = self.store.count(&name).await?;
                stats.push(CollectionStats { collection, points });
            }
        }
        Ok(stats)
    }

    /// Delete `name` explicitly; returns whether it existed.
    pub async fn drop_collection(&self, name: &str) -> AppResult<bool> {
        let lock = self.write_lock(name)?;
        let _guard = lock.lock().await;

        let existed = self.store.delete_collection(name).await?;
        if existed {
            info!("Dropped collection '{}'", name);
            if let Ok(mut active) = self.active.lock() {
                if active.as_ref().is_some_and(|c| c.name == name) {
                    *active = None;
                }
            }
        }
        Ok(existed)
    }
}
