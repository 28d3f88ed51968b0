//! # CCE Core
//!
//! Deterministic cognitive crystallization: turning a handful of labeled
//! concepts into a small, reproducible relational structure, the *crystal*.
//!
//! ## Pipeline
//!
//! Every request runs four stages over a static, typed, weighted knowledge
//! graph:
//!
//! 1. **Codebook** - Labels become bipolar hypervectors (D = 10,000)
//!    ```text
//!    v(label) = ChaCha8(SHA-256(label)[..8] ⊕ seed)
//!    sim(a, b) = (D − 2·hamming(a, b)) / D
//!    ```
//!
//! 2. **Plasma Field** - Activation spreads from the seed concepts
//!    ```text
//!    score(edge) = (1 + sim) / 2 × weight × T
//!    energy(target) = energy(source) × score
//!    ```
//!
//! 3. **Nucleation** - Bonded particles cluster into ranked seeds
//!    ```text
//!    bond if weight ≥ 0.3 × (1 − T)
//!    score(seed) = Σ energy(m) × weighted_degree(m)
//!    ```
//!
//! 4. **Crystallization** - The top seed grows until the node bound or until
//!    the best candidate falls below 15% of the root energy (apoptosis)
//!
//! Working memory carries the relations of recent turns between requests so
//! that the same question does not crystallize the same way twice.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use cce_core::{
//!     Engine, EngineConfig, GenerateRequest, KnowledgeGraph, Morphology, RelationKind,
//!     RelationTriple,
//! };
//!
//! let graph = KnowledgeGraph::from_triples([
//!     RelationTriple::new("Stille", RelationKind::Needs, "Ruhe", 0.8),
//!     RelationTriple::new("Stille", RelationKind::Causes, "Erkenntnis", 0.6),
//! ])
//! .unwrap();
//!
//! let engine = Engine::new(Arc::new(graph), EngineConfig::default()).unwrap();
//! let mut memory = engine.new_memory();
//!
//! let request = GenerateRequest::new(["Stille"])
//!     .with_emotion("neutral")
//!     .with_temperature(0.5);
//! let generation = engine.generate(&request, &mut memory).unwrap();
//!
//! assert_eq!(generation.crystal.morphology, Morphology::Parallel);
//! for edge in &generation.crystal.edges {
//!     println!("{} -{}-> {}", edge.from, edge.kind, edge.to);
//! }
//! ```
//!
//! ## Determinism
//!
//! Given the same graph, configuration, request and memory, every stage
//! produces identical output. All tie-breaks are explicit: energy, then
//! relation priority (CAUSES > LEADSTO > OPPOSES > NEEDS > HAS), then label.
//!
//! ## References
//!
//! - Kanerva, P. (2009). *Hyperdimensional Computing* - Binding and bundling
//! - Collins, A. M. & Loftus, E. F. (1975). *A spreading-activation theory of
//!   semantic processing*

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codebook;
pub mod concept;
pub mod config;
pub mod crystallization;
pub mod engine;
pub mod error;
pub mod knowledge;
pub mod memory;
pub mod nucleation;
pub mod plasma;

pub use codebook::{similarity, Codebook, HyperVector, DEFAULT_DIMENSION, DEFAULT_SEED};
pub use concept::{fold_label, normalize_label, same_label, Concept};
pub use config::EngineConfig;
pub use crystallization::{
	Crystal, CrystalConfig, CrystalEdge, CrystalNode, Crystallizer, Morphology, TerminationReason,
};
pub use engine::{
	Engine, GenerateRequest, Generation, GenerationReport, Phase, PhaseLog, Session,
};
pub use error::{EngineError, MemoryError, Result};
pub use knowledge::{GraphStats, KnowledgeGraph, RelationEdge, RelationKind, RelationTriple};
pub use memory::{MemoryConfig, MemoryEdge, MemoryFrame, WorkingMemory};
pub use nucleation::{Member, NucleationConfig, Nucleator, Seed};
pub use plasma::{
	activation_score, affinity, Origin, Particle, ParticleField, PlasmaConfig, PlasmaField,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
