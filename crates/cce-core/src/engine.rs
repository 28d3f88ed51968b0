//! Request orchestration.
//!
//! Runs one request through the four stages:
//!
//! 1. Encode and activate the plasma from intent and context concepts
//! 2. Color particle energies by the emotion label
//! 3. Nucleate seeds
//! 4. Grow the top seed into a crystal and update working memory
//!
//! The graph is shared read-only behind an [`Arc`]; working memory belongs
//! to the caller, or to a [`Session`] that serializes its requests.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::codebook::{Codebook, DEFAULT_SEED};
use crate::concept::{normalize_label, Concept};
use crate::config::EngineConfig;
use crate::crystallization::{Crystal, Crystallizer};
use crate::error::{EngineError, Result};
use crate::knowledge::KnowledgeGraph;
use crate::memory::WorkingMemory;
use crate::nucleation::Nucleator;
use crate::plasma::PlasmaField;

// ============================================================================
// Request
// ============================================================================

/// Input for one generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
	/// Concepts the crystal should express
	pub intent: Vec<Concept>,
	/// Emotion label coloring particle energies
	#[serde(default)]
	pub emotion: Option<String>,
	/// Background concepts, weighted down by the context weight
	#[serde(default)]
	pub context: Vec<Concept>,
	/// Exploration temperature in `[0, 1]`
	#[serde(default = "default_temperature")]
	pub temperature: f64,
	/// Codebook seed
	#[serde(default = "default_seed")]
	pub seed: u64,
}

const fn default_temperature() -> f64 {
	0.5
}

const fn default_seed() -> u64 {
	DEFAULT_SEED
}

impl GenerateRequest {
	/// Request with default temperature and seed.
	pub fn new<I, C>(intent: I) -> Self
	where
		I: IntoIterator<Item = C>,
		C: Into<Concept>,
	{
		Self {
			intent: intent.into_iter().map(Into::into).collect(),
			emotion: None,
			context: Vec::new(),
			temperature: default_temperature(),
			seed: default_seed(),
		}
	}

	/// Set the emotion label.
	#[must_use]
	pub fn with_emotion(mut self, emotion: &str) -> Self {
		self.emotion = Some(emotion.to_owned());
		self
	}

	/// Set the context concepts.
	#[must_use]
	pub fn with_context<I, C>(mut self, context: I) -> Self
	where
		I: IntoIterator<Item = C>,
		C: Into<Concept>,
	{
		self.context = context.into_iter().map(Into::into).collect();
		self
	}

	/// Set the temperature.
	#[must_use]
	pub const fn with_temperature(mut self, temperature: f64) -> Self {
		self.temperature = temperature;
		self
	}

	/// Set the codebook seed.
	#[must_use]
	pub const fn with_seed(mut self, seed: u64) -> Self {
		self.seed = seed;
		self
	}

	/// Reject structurally invalid requests.
	///
	/// # Errors
	///
	/// Returns an error for an empty intent, a temperature outside `[0, 1]`,
	/// a blank label or an invalid concept weight.
	pub fn validate(&self) -> Result<()> {
		if !(0.0..=1.0).contains(&self.temperature) {
			return Err(EngineError::TemperatureOutOfRange(self.temperature));
		}
		if self.intent.is_empty() {
			return Err(EngineError::EmptyIntent);
		}
		for concept in self.intent.iter().chain(&self.context) {
			concept.validate()?;
		}
		if let Some(emotion) = &self.emotion {
			if normalize_label(emotion).is_empty() {
				return Err(EngineError::EmptyLabel);
			}
		}
		Ok(())
	}
}

// ============================================================================
// Report
// ============================================================================

/// Pipeline stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
	/// Spreading activation
	Plasma,
	/// Emotional coloring
	Resonance,
	/// Seed clustering
	Nucleation,
	/// Crystal growth
	Crystallization,
}

impl fmt::Display for Phase {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Plasma => "plasma",
			Self::Resonance => "resonance",
			Self::Nucleation => "nucleation",
			Self::Crystallization => "crystallization",
		})
	}
}

/// Timing and a short summary of one stage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseLog {
	/// Stage
	pub phase: Phase,
	/// Wall-clock time spent
	pub duration: Duration,
	/// Human-readable summary
	pub details: String,
}

impl PhaseLog {
	fn record(phase: Phase, started: Instant, details: String) -> Self {
		let duration = started.elapsed();
		debug!(%phase, ?duration, details = %details, "phase complete");
		Self {
			phase,
			duration,
			details,
		}
	}
}

/// Diagnostics for one generation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationReport {
	/// Stage logs in execution order
	pub phases: Vec<PhaseLog>,
	/// Active particles after spreading
	pub particles: usize,
	/// Seeds formed by nucleation
	pub seeds: usize,
	/// Total wall-clock time
	pub elapsed: Duration,
	/// Whether `elapsed` exceeded the configured budget
	pub budget_exceeded: bool,
	/// Whether corrupt working memory was reset before generating
	pub memory_reset: bool,
}

/// Result of one generation.
#[derive(Clone, Debug, PartialEq)]
pub struct Generation {
	/// The grown crystal
	pub crystal: Crystal,
	/// Stage diagnostics
	pub report: GenerationReport,
}

// ============================================================================
// Engine
// ============================================================================

/// Working memory shared by the requests of one conversation.
///
/// Requests against the same session run one at a time.
#[derive(Debug, Default)]
pub struct Session {
	memory: Mutex<WorkingMemory>,
}

impl Session {
	/// Empty session sized by the configuration.
	#[must_use]
	pub fn new(config: &EngineConfig) -> Self {
		Self::from_memory(WorkingMemory::from_config(&config.memory))
	}

	/// Resume a session from previously saved memory.
	#[must_use]
	pub fn from_memory(memory: WorkingMemory) -> Self {
		Self {
			memory: Mutex::new(memory),
		}
	}

	/// Copy of the current memory.
	#[must_use]
	pub fn snapshot(&self) -> WorkingMemory {
		self.memory.lock().clone()
	}

	/// Forget all recorded turns.
	pub fn reset(&self) {
		self.memory.lock().reset();
	}
}

/// The crystallization engine.
#[derive(Clone, Debug)]
pub struct Engine {
	graph: Arc<KnowledgeGraph>,
	config: EngineConfig,
}

impl Engine {
	/// Create an engine over a shared graph.
	///
	/// # Errors
	///
	/// Returns an error if the configuration is invalid.
	pub fn new(graph: Arc<KnowledgeGraph>, config: EngineConfig) -> Result<Self> {
		config.validate()?;
		Ok(Self { graph, config })
	}

	/// Shared knowledge graph.
	#[must_use]
	pub fn graph(&self) -> &KnowledgeGraph {
		&self.graph
	}

	/// Active configuration.
	#[must_use]
	pub const fn config(&self) -> &EngineConfig {
		&self.config
	}

	/// Fresh memory sized by the configuration.
	#[must_use]
	pub fn new_memory(&self) -> WorkingMemory {
		WorkingMemory::from_config(&self.config.memory)
	}

	/// Fresh session sized by the configuration.
	#[must_use]
	pub fn new_session(&self) -> Session {
		Session::new(&self.config)
	}

	/// Generate a crystal and record it in `memory`.
	///
	/// Concepts absent from the graph are not an error: they yield an empty
	/// crystal terminated as `no-knowledge`. Corrupt memory is reset first.
	///
	/// # Errors
	///
	/// Returns an error if the request is structurally invalid.
	#[instrument(skip_all, fields(intent = request.intent.len(), temperature = request.temperature, seed = request.seed))]
	pub fn generate(&self, request: &GenerateRequest, memory: &mut WorkingMemory) -> Result<Generation> {
		let started = Instant::now();
		request.validate()?;
		let codebook = Codebook::new(self.config.dimension, request.seed)?;

		let mut report = GenerationReport::default();
		if let Err(err) = memory.validate() {
			warn!(%err, "working memory is corrupt; resetting");
			*memory = self.new_memory();
			report.memory_reset = true;
		}

		// Plasma
		let phase_start = Instant::now();
		let mut seeds: Vec<Concept> = request.intent.clone();
		seeds.extend(request.context.iter().map(|concept| {
			Concept::weighted(concept.label(), concept.weight() * self.config.context_weight)
		}));
		let mut field = PlasmaField::new(&codebook, &self.graph, &self.config.plasma)
			.activate(&seeds, request.temperature);
		report.particles = field.len();
		report.phases.push(PhaseLog::record(
			Phase::Plasma,
			phase_start,
			format!("{} seeds activated {} particles", seeds.len(), field.len()),
		));

		// Resonance
		if let Some(emotion) = &request.emotion {
			let phase_start = Instant::now();
			field.resonate(emotion, &self.graph, self.config.emotion_gain);
			report.phases.push(PhaseLog::record(
				Phase::Resonance,
				phase_start,
				format!("colored by `{}`", normalize_label(emotion)),
			));
		}

		// Nucleation
		let phase_start = Instant::now();
		let nuclei = Nucleator::new(&codebook, &self.graph, &self.config.nucleation).cluster(
			&field,
			memory,
			request.temperature,
		);
		report.seeds = nuclei.len();
		report.phases.push(PhaseLog::record(
			Phase::Nucleation,
			phase_start,
			match nuclei.first() {
				Some(top) => format!("{} seeds, top rooted at `{}`", nuclei.len(), top.root().concept),
				None => "no seeds".to_owned(),
			},
		));

		// Crystallization
		let phase_start = Instant::now();
		let remaining = nuclei.get(1..).unwrap_or_default();
		let crystal = Crystallizer::new(&self.graph, &self.config.crystal).grow(nuclei.first(), remaining, memory);
		report.phases.push(PhaseLog::record(
			Phase::Crystallization,
			phase_start,
			format!(
				"{} nodes, {}, {}",
				crystal.len(),
				crystal.morphology,
				crystal.termination
			),
		));

		report.elapsed = started.elapsed();
		let budget = self.config.wall_clock_budget();
		if report.elapsed > budget {
			report.budget_exceeded = true;
			warn!(elapsed = ?report.elapsed, ?budget, "generation exceeded wall-clock budget");
		}

		Ok(Generation { crystal, report })
	}

	/// Generate against a session's memory, holding its lock for the request.
	///
	/// # Errors
	///
	/// Returns an error if the request is structurally invalid.
	pub fn generate_in_session(&self, request: &GenerateRequest, session: &Session) -> Result<Generation> {
		let mut memory = session.memory.lock();
		self.generate(request, &mut memory)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::crystallization::{Morphology, TerminationReason};
	use crate::knowledge::{RelationKind, RelationTriple};

	fn engine() -> Engine {
		let graph = KnowledgeGraph::from_triples([
			RelationTriple::new("Stille", RelationKind::Needs, "Ruhe", 0.8),
			RelationTriple::new("Stille", RelationKind::Causes, "Erkenntnis", 0.6),
			RelationTriple::new("neutral", RelationKind::Has, "Ruhe", 0.3),
		])
		.expect("valid graph");
		Engine::new(Arc::new(graph), EngineConfig::default()).expect("valid config")
	}

	#[test]
	fn test_generate_stille() {
		let engine = engine();
		let mut memory = engine.new_memory();
		let request = GenerateRequest::new(["Stille"])
			.with_emotion("neutral")
			.with_temperature(0.5)
			.with_seed(42);
		let generation = engine.generate(&request, &mut memory).expect("valid request");

		assert_eq!(generation.crystal.len(), 3);
		assert_eq!(generation.crystal.morphology, Morphology::Parallel);
		assert_eq!(generation.crystal.termination, TerminationReason::Apoptosis);
		assert_eq!(generation.report.phases.len(), 4);
		assert_eq!(memory.turn_count(), 1);
	}

	#[test]
	fn test_request_validation() {
		let engine = engine();
		let mut memory = engine.new_memory();

		let empty = GenerateRequest::new(Vec::<Concept>::new());
		assert!(matches!(engine.generate(&empty, &mut memory), Err(EngineError::EmptyIntent)));

		let hot = GenerateRequest::new(["Stille"]).with_temperature(1.5);
		assert!(matches!(
			engine.generate(&hot, &mut memory),
			Err(EngineError::TemperatureOutOfRange(_))
		));

		let nan = GenerateRequest::new(["Stille"]).with_temperature(f64::NAN);
		assert!(engine.generate(&nan, &mut memory).is_err());

		let blank = GenerateRequest::new(["Stille"]).with_context(["  "]);
		assert!(matches!(engine.generate(&blank, &mut memory), Err(EngineError::EmptyLabel)));
		assert!(memory.is_empty());
	}

	#[test]
	fn test_context_is_weighted_down() {
		let engine = engine();
		let mut memory = engine.new_memory();
		let request = GenerateRequest::new(["Stille"])
			.with_context(["Ruhe"])
			.with_temperature(0.0);
		let generation = engine.generate(&request, &mut memory).expect("valid request");

		let crystal = &generation.crystal;
		assert_eq!(crystal.root().map(|n| n.concept.as_str()), Some("Stille"));
		let ruhe = crystal.node("Ruhe").map(|n| n.energy).unwrap_or_default();
		assert!((ruhe - 0.6).abs() < 1e-12);
	}

	#[test]
	fn test_session_accumulates_memory() {
		let engine = engine();
		let session = engine.new_session();
		let request = GenerateRequest::new(["Stille"]);

		let _ = engine.generate_in_session(&request, &session).expect("first");
		let _ = engine.generate_in_session(&request, &session).expect("second");
		assert_eq!(session.snapshot().turn_count(), 2);

		session.reset();
		assert!(session.snapshot().is_empty());
	}

	#[test]
	fn test_invalid_config_rejected() {
		let config = EngineConfig {
			dimension: 0,
			..EngineConfig::default()
		};
		let graph = Arc::new(KnowledgeGraph::default());
		assert!(matches!(Engine::new(graph, config), Err(EngineError::InvalidDimension)));
	}
}
