use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{IoModel, ModelSnapshot};
use crate::error::{EngineError, EngineResult};

/// Immutable metadata row for a registered model. A revision registers a new
/// version; existing versions are never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub model_version_id: Uuid,
    pub base_year: i32,
    pub source: String,
    pub sector_count: usize,
    pub checksum: String,
    pub denomination: String,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct RegisteredModel {
    pub version: ModelVersion,
    pub model: IoModel,
}

impl RegisteredModel {
    pub fn id(&self) -> Uuid {
        self.version.model_version_id
    }
}

/// In-memory registry of model versions.
#[derive(Debug, Default)]
pub struct ModelStore {
    models: RwLock<HashMap<Uuid, Arc<RegisteredModel>>>,
}

impl ModelStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        snapshot: ModelSnapshot,
        source: impl Into<String>,
    ) -> EngineResult<ModelVersion> {
        let model = IoModel::from_snapshot(snapshot)?;
        let version = ModelVersion {
            model_version_id: Uuid::new_v4(),
            base_year: model.base_year(),
            source: source.into(),
            sector_count: model.n(),
            checksum: model.checksum().to_string(),
            denomination: model.denomination().to_string(),
            registered_at: Utc::now(),
        };

        info!(
            model_version_id = %version.model_version_id,
            sectors = version.sector_count,
            max_column_sum = model.max_column_sum(),
            checksum = %version.checksum,
            "registered model version"
        );

        self.models.write().insert(
            version.model_version_id,
            Arc::new(RegisteredModel {
                version: version.clone(),
                model,
            }),
        );
        Ok(version)
    }

    pub fn get(&self, model_version_id: Uuid) -> EngineResult<Arc<RegisteredModel>> {
        self.models
            .read()
            .get(&model_version_id)
            .cloned()
            .ok_or(EngineError::UnknownModelVersion(model_version_id))
    }

    pub fn versions(&self) -> Vec<ModelVersion> {
        let mut versions: Vec<_> = self
            .models
            .read()
            .values()
            .map(|m| m.version.clone())
            .collect();
        versions.sort_by_key(|v| v.registered_at);
        versions
    }

    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::io_model::tests::two_sector_snapshot;

    #[test]
    fn test_register_and_get() {
        let store = ModelStore::new();
        let version = store.register(two_sector_snapshot(), "test").unwrap();
        assert_eq!(version.sector_count, 2);
        assert_eq!(version.base_year, 2023);

        let loaded = store.get(version.model_version_id).unwrap();
        assert_eq!(loaded.version, version);
        assert_eq!(loaded.model.n(), 2);
    }

    #[test]
    fn test_revision_creates_new_version() {
        let store = ModelStore::new();
        let v1 = store.register(two_sector_snapshot(), "test").unwrap();
        let mut revised = two_sector_snapshot();
        revised.x = vec![1100.0, 2100.0];
        let v2 = store.register(revised, "test").unwrap();

        assert_ne!(v1.model_version_id, v2.model_version_id);
        assert_ne!(v1.checksum, v2.checksum);
        assert_eq!(store.len(), 2);
        // the original version is untouched
        assert_eq!(store.get(v1.model_version_id).unwrap().version, v1);
    }

    #[test]
    fn test_unknown_version() {
        let store = ModelStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(store.get(id), Err(EngineError::UnknownModelVersion(v)) if v == id));
    }

    #[test]
    fn test_invalid_snapshot_not_registered() {
        let store = ModelStore::new();
        let mut snap = two_sector_snapshot();
        snap.x.pop();
        assert!(store.register(snap, "test").is_err());
        assert!(store.is_empty());
    }
}
