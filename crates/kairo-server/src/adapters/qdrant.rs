//! Qdrant implementation of SemanticIndex
//!
//! One Qdrant collection per tier: `{prefix}_short_term` and
//! `{prefix}_long_term`. Points carry the MemoryItem as payload (without
//! its embedding) plus a numeric `ts` field used for time filters and
//! recency ordering.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Direction, Distance, FieldType, Filter, GetPointsBuilder, OrderBy,
    PointId, PointStruct, Range, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder,
};
use qdrant_client::{Qdrant, QdrantError};

use kairo::{
    Collection, DomainError, EmbeddingService, MemoryItem, MemorySearchFilter, ScoredMemory,
    SemanticIndex, TagMatchMode,
};

const TIMESTAMP_FIELD: &str = "ts";

/// Semantic index stored in Qdrant
pub struct QdrantSemanticIndex {
    client: Qdrant,
    prefix: String,
    embedding: Arc<dyn EmbeddingService>,
}

impl QdrantSemanticIndex {
    /// Connect to Qdrant
    pub fn new(
        url: &str,
        api_key: Option<String>,
        prefix: impl Into<String>,
        embedding: Arc<dyn EmbeddingService>,
    ) -> Result<Self, DomainError> {
        let client = if let Some(key) = api_key {
            Qdrant::from_url(url).api_key(key).build()
        } else {
            Qdrant::from_url(url).build()
        }
        .map_err(map_qdrant_error)?;

        tracing::info!("🌊 Connected to Qdrant at {}", url);

        Ok(Self {
            client,
            prefix: prefix.into(),
            embedding,
        })
    }

    fn collection_name(&self, collection: Collection) -> String {
        match collection {
            Collection::ShortTerm => format!("{}_short_term", self.prefix),
            Collection::LongTerm => format!("{}_long_term", self.prefix),
        }
    }

    /// Create both collections and their payload indexes if missing
    pub async fn ensure_collections(&self) -> Result<(), DomainError> {
        for collection in Collection::ALL {
            let name = self.collection_name(collection);

            if self
                .client
                .collection_exists(&name)
                .await
                .map_err(map_qdrant_error)?
            {
                tracing::info!("Collection {} already exists", name);
                continue;
            }

            self.client
                .create_collection(CreateCollectionBuilder::new(&name).vectors_config(
                    VectorParamsBuilder::new(self.embedding.dimensions() as u64, Distance::Cosine),
                ))
                .await
                .map_err(map_qdrant_error)?;

            let indexes = [
                ("kind", FieldType::Keyword),
                ("tags", FieldType::Keyword),
                ("importance", FieldType::Float),
                (TIMESTAMP_FIELD, FieldType::Integer),
            ];
            for (field, field_type) in indexes {
                self.client
                    .create_field_index(CreateFieldIndexCollectionBuilder::new(
                        &name, field, field_type,
                    ))
                    .await
                    .map_err(map_qdrant_error)?;
            }

            tracing::info!("✨ Created collection: {}", name);
        }
        Ok(())
    }
}

/// Unavailability and deadlines are transient; everything else is not
fn map_qdrant_error(e: QdrantError) -> DomainError {
    let message = e.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("unavailable")
        || lowered.contains("deadline")
        || lowered.contains("timeout")
        || lowered.contains("timed out")
        || lowered.contains("resource exhausted")
    {
        DomainError::Transient(format!("Qdrant: {}", message))
    } else {
        DomainError::ExternalService(format!("Qdrant: {}", message))
    }
}

fn point_id(id: &str) -> Result<PointId, DomainError> {
    uuid::Uuid::parse_str(id)
        .map(|u| PointId::from(u.to_string()))
        .map_err(|_| DomainError::Validation(format!("memory id is not a UUID: {}", id)))
}

fn item_to_payload(item: &MemoryItem) -> Result<HashMap<String, serde_json::Value>, DomainError> {
    let mut stored = item.clone();
    stored.embedding = None;

    let mut payload: HashMap<String, serde_json::Value> = serde_json::to_value(&stored)
        .and_then(serde_json::from_value)
        .map_err(|e| DomainError::Repository(format!("payload encode: {}", e)))?;
    payload.insert(TIMESTAMP_FIELD.to_string(), item.timestamp.timestamp().into());
    Ok(payload)
}

fn payload_to_item(payload: &HashMap<String, qdrant_client::qdrant::Value>) -> Option<MemoryItem> {
    let mut json = serde_json::to_value(payload).ok()?;
    if let Some(map) = json.as_object_mut() {
        map.remove(TIMESTAMP_FIELD);
    }
    serde_json::from_value(json).ok()
}

fn build_filter(filter: &MemorySearchFilter) -> Option<Filter> {
    let mut must: Vec<Condition> = Vec::new();

    if !filter.kinds.is_empty() {
        let kinds: Vec<String> = filter.kinds.iter().map(|k| k.as_str().to_string()).collect();
        must.push(Condition::matches("kind", kinds));
    }

    if !filter.tags.is_empty() {
        match filter.tags_match_mode {
            TagMatchMode::Any => must.push(Condition::matches("tags", filter.tags.clone())),
            TagMatchMode::All => {
                for tag in &filter.tags {
                    must.push(Condition::matches("tags", tag.clone()));
                }
            }
        }
    }

    if let Some(min) = filter.min_importance {
        must.push(Condition::range(
            "importance",
            Range {
                gte: Some(min as f64),
                ..Default::default()
            },
        ));
    }

    if filter.since.is_some() || filter.until.is_some() {
        must.push(Condition::range(
            TIMESTAMP_FIELD,
            Range {
                gte: filter.since.map(|t| t.timestamp() as f64),
                lte: filter.until.map(|t| t.timestamp() as f64),
                ..Default::default()
            },
        ));
    }

    if must.is_empty() {
        None
    } else {
        Some(Filter::must(must))
    }
}

#[async_trait]
impl SemanticIndex for QdrantSemanticIndex {
    async fn index(&self, item: &MemoryItem, collection: Collection) -> Result<(), DomainError> {
        let id = point_id(&item.id)?;
        let text = if item.content.trim().is_empty() {
            &item.summary
        } else {
            &item.content
        };
        let vector = self.embedding.embed_or_zero(text).await?;
        let payload = item_to_payload(item)?;

        let point = PointStruct::new(id, vector, payload);
        self.client
            .upsert_points(
                UpsertPointsBuilder::new(self.collection_name(collection), vec![point]).wait(true),
            )
            .await
            .map_err(map_qdrant_error)?;

        tracing::debug!("💾 Indexed {} into {}", item.id, collection);
        Ok(())
    }

    async fn search(
        &self,
        query_text: &str,
        collection: Collection,
        max_results: usize,
        min_score: f32,
        filter: &MemorySearchFilter,
    ) -> Result<Vec<ScoredMemory>, DomainError> {
        if max_results == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embedding.embed_or_zero(query_text).await?;
        let mut request =
            SearchPointsBuilder::new(self.collection_name(collection), vector, max_results as u64)
                .with_payload(true)
                .score_threshold(min_score);
        if let Some(f) = build_filter(filter) {
            request = request.filter(f);
        }

        let response = self
            .client
            .search_points(request)
            .await
            .map_err(map_qdrant_error)?;

        let hits: Vec<ScoredMemory> = response
            .result
            .into_iter()
            .filter_map(|point| {
                let item = payload_to_item(&point.payload)?;
                Some(ScoredMemory {
                    item,
                    score: point.score,
                })
            })
            .collect();

        tracing::debug!("🔍 Found {} hits in {}", hits.len(), collection);
        Ok(hits)
    }

    async fn get_all_recent(
        &self,
        collection: Collection,
        max_results: usize,
    ) -> Result<Vec<MemoryItem>, DomainError> {
        if max_results == 0 {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .scroll(
                ScrollPointsBuilder::new(self.collection_name(collection))
                    .limit(max_results as u32)
                    .with_payload(true)
                    .order_by(OrderBy {
                        key: TIMESTAMP_FIELD.to_string(),
                        direction: Some(Direction::Desc.into()),
                        start_from: None,
                    }),
            )
            .await
            .map_err(map_qdrant_error)?;

        Ok(response
            .result
            .iter()
            .filter_map(|point| payload_to_item(&point.payload))
            .collect())
    }

    async fn delete(&self, id: &str, collection: Collection) -> Result<bool, DomainError> {
        let pid = point_id(id)?;
        let name = self.collection_name(collection);

        let existing = self
            .client
            .get_points(GetPointsBuilder::new(&name, vec![pid.clone()]))
            .await
            .map_err(map_qdrant_error)?;
        if existing.result.is_empty() {
            return Ok(false);
        }

        self.client
            .delete_points(DeletePointsBuilder::new(&name).points(vec![pid]).wait(true))
            .await
            .map_err(map_qdrant_error)?;

        tracing::debug!("🗑️ Deleted {} from {}", id, collection);
        Ok(true)
    }

    async fn count(&self) -> Result<u64, DomainError> {
        let mut total = 0;
        for collection in Collection::ALL {
            let response = self
                .client
                .count(CountPointsBuilder::new(self.collection_name(collection)).exact(true))
                .await
                .map_err(map_qdrant_error)?;
            total += response.result.map(|r| r.count).unwrap_or(0);
        }
        Ok(total)
    }
}
