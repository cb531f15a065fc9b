//! Memory engine: entities, signal dynamics, deduplication,
//! associations, ingestion, and retrieval.

pub mod associations;
pub mod dedup;
pub mod ingestion;
pub mod retrieval;
pub mod signal;
pub mod types;

pub use associations::AssociationEngine;
pub use dedup::Deduplicator;
pub use ingestion::{AddMemory, IngestionPipeline};
pub use retrieval::{RetrievalPipeline, SearchRequest, SearchResponse};
pub use signal::{DecaySchedule, SignalService};
pub use types::{Chronicle, Engram, Nexus, Strand, Synapse};
