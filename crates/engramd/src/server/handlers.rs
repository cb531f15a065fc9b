//! Request handlers and wire DTOs.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::memory::dedup::content_hash;
use crate::memory::ingestion::AddMemory;
use crate::memory::retrieval::{ChronicleMatch, ScoreTrace, SearchRequest};
use crate::memory::signal::DecayReport;
use crate::memory::types::{Chronicle, Engram, Metadata, Nexus, Strand};
use crate::server::AppState;
use crate::storage::{ChroniclePatch, ChronicleQuery, EngramPatch, StoreStats};
use crate::temporal::{LinkChronicles, RecordFact};

/// Engram representation for responses: everything except the embedding,
/// which would dominate every payload.
#[derive(Debug, Clone, Serialize)]
pub struct EngramView {
    pub id: Uuid,
    pub owner_id: String,
    pub content: String,
    pub content_hash: String,
    pub strand: Strand,
    pub tags: Vec<String>,
    pub metadata: Metadata,
    pub signal: f32,
    pub pulse_rate: f32,
    pub access_count: u32,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl From<&Engram> for EngramView {
    fn from(engram: &Engram) -> Self {
        Self {
            id: engram.id,
            owner_id: engram.owner_id.clone(),
            content: engram.content.clone(),
            content_hash: engram.content_hash.clone(),
            strand: engram.strand,
            tags: engram.tags.clone(),
            metadata: engram.metadata.clone(),
            signal: engram.signal,
            pulse_rate: engram.pulse_rate,
            access_count: engram.access_count,
            version: engram.version,
            created_at: engram.created_at,
            updated_at: engram.updated_at,
            last_accessed_at: engram.last_accessed_at,
        }
    }
}

fn parse_strand(value: Option<&str>) -> Result<Option<Strand>> {
    match value {
        None => Ok(None),
        Some(raw) => Strand::parse(raw)
            .map(Some)
            .ok_or_else(|| EngineError::Validation(format!("unknown strand '{raw}'"))),
    }
}

fn require_owner(owner_id: &str) -> Result<()> {
    if owner_id.trim().is_empty() {
        return Err(EngineError::Validation("owner_id is required".to_string()));
    }
    Ok(())
}

// ── Health and status ──

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub healthy: bool,
    pub stats: StoreStats,
}

pub async fn status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>> {
    let healthy = state.store.health_check().await.unwrap_or(false);
    let stats = state.store.get_stats().await?;
    Ok(Json(StatusResponse { healthy, stats }))
}

// ── Engrams ──

#[derive(Debug, Deserialize)]
pub struct IngestBody {
    pub owner_id: String,
    pub content: String,
    pub strand: Option<String>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<Metadata>,
    pub signal: Option<f32>,
    pub pulse_rate: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub engrams: Vec<EngramView>,
    pub total: usize,
}

pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Json(body): Json<IngestBody>,
) -> Result<(StatusCode, Json<IngestResponse>)> {
    let strand = parse_strand(body.strand.as_deref())?;
    let engrams = state
        .ingestion
        .add_memory(
            &body.owner_id,
            AddMemory {
                content: body.content,
                strand,
                tags: body.tags,
                metadata: body.metadata,
                signal: body.signal,
                pulse_rate: body.pulse_rate,
            },
        )
        .await?;

    let views: Vec<EngramView> = engrams.iter().map(EngramView::from).collect();
    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            total: views.len(),
            engrams: views,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub owner_id: String,
    #[serde(default = "default_list_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    pub strand: Option<String>,
}

fn default_list_limit() -> usize {
    50
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub engrams: Vec<EngramView>,
    pub limit: usize,
    pub offset: usize,
}

pub async fn list_engrams(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>> {
    require_owner(&query.owner_id)?;
    let strand = parse_strand(query.strand.as_deref())?;
    let engrams = state
        .store
        .list_engrams(&query.owner_id, query.limit, query.offset, strand)
        .await?;
    Ok(Json(ListResponse {
        engrams: engrams.iter().map(EngramView::from).collect(),
        limit: query.limit,
        offset: query.offset,
    }))
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub owner_id: String,
}

pub async fn get_engram(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<EngramView>> {
    require_owner(&query.owner_id)?;
    let engram = state
        .store
        .get_engram(&query.owner_id, id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("engram {id}")))?;
    Ok(Json(EngramView::from(&engram)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateEngramBody {
    pub owner_id: String,
    pub content: Option<String>,
    pub strand: Option<String>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<Metadata>,
    pub signal: Option<f32>,
    pub pulse_rate: Option<f32>,
}

pub async fn update_engram(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateEngramBody>,
) -> Result<Json<EngramView>> {
    require_owner(&body.owner_id)?;
    let strand = parse_strand(body.strand.as_deref())?;
    for (name, value) in [("signal", body.signal), ("pulse_rate", body.pulse_rate)] {
        if let Some(v) = value {
            if !(0.0..=1.0).contains(&v) {
                return Err(EngineError::Validation(format!(
                    "{name} must be within [0, 1], got {v}"
                )));
            }
        }
    }

    // A content change re-derives the hash and embedding; the store only
    // persists what it is handed.
    let (content_hash, embedding) = match &body.content {
        Some(content) => {
            let trimmed = content.trim();
            if trimmed.is_empty() {
                return Err(EngineError::Validation("content must not be empty".to_string()));
            }
            (
                Some(content_hash(trimmed)),
                Some(state.embedder.embed(trimmed).await?),
            )
        }
        None => (None, None),
    };

    let patch = EngramPatch {
        content: body.content.map(|c| c.trim().to_string()),
        content_hash,
        embedding,
        strand,
        tags: body.tags,
        metadata: body.metadata,
        signal: body.signal,
        pulse_rate: body.pulse_rate,
    };
    let engram = state.store.update_engram(&body.owner_id, id, patch).await?;
    Ok(Json(EngramView::from(&engram)))
}

pub async fn delete_engram(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
) -> Result<StatusCode> {
    require_owner(&query.owner_id)?;
    state.store.delete_engram(&query.owner_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ReinforceBody {
    pub owner_id: String,
    pub boost: Option<f32>,
}

pub async fn reinforce_engram(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<ReinforceBody>,
) -> Result<Json<EngramView>> {
    require_owner(&body.owner_id)?;
    if let Some(boost) = body.boost {
        if !(0.0..=1.0).contains(&boost) {
            return Err(EngineError::Validation(format!(
                "boost must be within [0, 1], got {boost}"
            )));
        }
    }
    let engram = state.signal.reinforce(&body.owner_id, id, body.boost).await?;
    Ok(Json(EngramView::from(&engram)))
}

// ── Search ──

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    pub owner_id: String,
    pub query: String,
    pub limit: Option<usize>,
    pub strand: Option<String>,
    pub min_score: Option<f32>,
    pub min_final_score: Option<f32>,
    pub expand_synapses: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SearchHitView {
    pub engram: EngramView,
    pub final_score: f32,
    pub trace: ScoreTrace,
}

#[derive(Debug, Serialize)]
pub struct SearchResponseView {
    pub hits: Vec<SearchHitView>,
    pub chronicle_matches: Vec<ChronicleMatch>,
    pub total: usize,
    pub query: String,
    pub elapsed_ms: u64,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SearchBody>,
) -> Result<Json<SearchResponseView>> {
    let strand = parse_strand(body.strand.as_deref())?;
    let response = state
        .retrieval
        .search(
            &body.owner_id,
            SearchRequest {
                query: body.query,
                limit: body.limit,
                strand,
                min_score: body.min_score,
                min_final_score: body.min_final_score,
                expand_synapses: body.expand_synapses,
            },
        )
        .await?;

    Ok(Json(SearchResponseView {
        hits: response
            .hits
            .into_iter()
            .map(|hit| SearchHitView {
                engram: EngramView::from(&hit.engram),
                final_score: hit.final_score,
                trace: hit.trace,
            })
            .collect(),
        chronicle_matches: response.chronicle_matches,
        total: response.total,
        query: response.query,
        elapsed_ms: response.elapsed_ms,
    }))
}

// ── Chronicles ──

#[derive(Debug, Deserialize)]
pub struct RecordChronicleBody {
    pub owner_id: String,
    pub entity: String,
    pub attribute: String,
    pub value: String,
    pub certainty: Option<f32>,
    pub effective_from: Option<DateTime<Utc>>,
    pub effective_until: Option<DateTime<Utc>>,
    pub metadata: Option<Metadata>,
}

pub async fn record_chronicle(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RecordChronicleBody>,
) -> Result<(StatusCode, Json<Chronicle>)> {
    require_owner(&body.owner_id)?;
    if let Some(certainty) = body.certainty {
        if !(0.0..=1.0).contains(&certainty) {
            return Err(EngineError::Validation(format!(
                "certainty must be within [0, 1], got {certainty}"
            )));
        }
    }
    let chronicle = state
        .temporal
        .record_fact(
            &body.owner_id,
            RecordFact {
                entity: body.entity,
                attribute: body.attribute,
                value: body.value,
                certainty: body.certainty,
                effective_from: body.effective_from,
                effective_until: body.effective_until,
                metadata: body.metadata,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(chronicle)))
}

#[derive(Debug, Deserialize)]
pub struct ChroniclesQuery {
    pub owner_id: String,
    pub entity: Option<String>,
    pub attribute: Option<String>,
    pub at: Option<DateTime<Utc>>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ChroniclesResponse {
    pub chronicles: Vec<Chronicle>,
    pub total: usize,
}

pub async fn query_chronicles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ChroniclesQuery>,
) -> Result<Json<ChroniclesResponse>> {
    require_owner(&query.owner_id)?;
    let chronicles = state
        .temporal
        .query(
            &query.owner_id,
            &ChronicleQuery {
                entity: query.entity,
                attribute: query.attribute,
                at: query.at,
                from: query.from,
                to: query.to,
                limit: query.limit,
            },
        )
        .await?;
    Ok(Json(ChroniclesResponse {
        total: chronicles.len(),
        chronicles,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CurrentQuery {
    pub owner_id: String,
    pub entity: Option<String>,
    pub attribute: Option<String>,
}

pub async fn current_chronicles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CurrentQuery>,
) -> Result<Json<ChroniclesResponse>> {
    require_owner(&query.owner_id)?;
    let chronicles = match (&query.entity, &query.attribute) {
        (Some(entity), Some(attribute)) => state
            .temporal
            .current_fact(&query.owner_id, entity, attribute)
            .await?
            .into_iter()
            .collect(),
        _ => {
            let mut current = state.temporal.current_chronicles(&query.owner_id).await?;
            if let Some(entity) = &query.entity {
                current.retain(|c| &c.entity == entity);
            }
            current
        }
    };
    Ok(Json(ChroniclesResponse {
        total: chronicles.len(),
        chronicles,
    }))
}

#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    pub owner_id: String,
    pub entity: String,
}

pub async fn chronicle_timeline(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<ChroniclesResponse>> {
    require_owner(&query.owner_id)?;
    if query.entity.trim().is_empty() {
        return Err(EngineError::Validation("entity is required".to_string()));
    }
    let chronicles = state.temporal.timeline(&query.owner_id, &query.entity).await?;
    Ok(Json(ChroniclesResponse {
        total: chronicles.len(),
        chronicles,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateChronicleBody {
    pub owner_id: String,
    pub value: Option<String>,
    pub certainty: Option<f32>,
    pub metadata: Option<Metadata>,
    pub effective_until: Option<DateTime<Utc>>,
}

pub async fn update_chronicle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateChronicleBody>,
) -> Result<Json<Chronicle>> {
    require_owner(&body.owner_id)?;
    if let Some(certainty) = body.certainty {
        if !(0.0..=1.0).contains(&certainty) {
            return Err(EngineError::Validation(format!(
                "certainty must be within [0, 1], got {certainty}"
            )));
        }
    }
    let chronicle = state
        .store
        .update_chronicle(
            &body.owner_id,
            id,
            ChroniclePatch {
                value: body.value,
                certainty: body.certainty,
                metadata: body.metadata,
                effective_until: body.effective_until.map(Some),
            },
        )
        .await?;
    Ok(Json(chronicle))
}

pub async fn expire_chronicle(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Chronicle>> {
    require_owner(&query.owner_id)?;
    let chronicle = state.temporal.expire(&query.owner_id, id).await?;
    Ok(Json(chronicle))
}

pub async fn related_chronicles(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<ChroniclesResponse>> {
    require_owner(&query.owner_id)?;
    let chronicles = state.temporal.related(&query.owner_id, id).await?;
    Ok(Json(ChroniclesResponse {
        total: chronicles.len(),
        chronicles,
    }))
}

// ── Nexuses ──

#[derive(Debug, Deserialize)]
pub struct CreateNexusBody {
    pub owner_id: String,
    pub origin_id: Uuid,
    pub linked_id: Uuid,
    pub bond_type: String,
    pub strength: Option<f32>,
    pub metadata: Option<Metadata>,
}

pub async fn create_nexus(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateNexusBody>,
) -> Result<(StatusCode, Json<Nexus>)> {
    require_owner(&body.owner_id)?;
    if let Some(strength) = body.strength {
        if !(0.0..=1.0).contains(&strength) {
            return Err(EngineError::Validation(format!(
                "strength must be within [0, 1], got {strength}"
            )));
        }
    }
    let nexus = state
        .temporal
        .link(
            &body.owner_id,
            LinkChronicles {
                origin_id: body.origin_id,
                linked_id: body.linked_id,
                bond_type: body.bond_type,
                strength: body.strength,
                metadata: body.metadata,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(nexus)))
}

// ── Decay ──

#[derive(Debug, Deserialize)]
pub struct RunDecayBody {
    pub owner_id: String,
}

pub async fn run_decay(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RunDecayBody>,
) -> Result<Json<DecayReport>> {
    require_owner(&body.owner_id)?;
    let report = state.signal.run_decay_cycle(&body.owner_id).await?;
    Ok(Json(report))
}
