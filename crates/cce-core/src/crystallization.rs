//! Crystallization Engine
//!
//! Grows the top-ranked seed into a bounded, rooted relational structure.
//!
//! Growth starts from the seed's highest-energy member. Each step scores
//! every graph neighbor of every crystal node that is not yet part of the
//! crystal:
//!
//! `score = energy(source) × weight`
//!
//! where `energy(source)` is the source's particle energy in any seed, or
//! `default_energy` for concepts reached only through growth. Repeated
//! relations (present in working memory) carry the score times their
//! repetition factor and rank below every fresh candidate.
//!
//! Growth stops at `max_nodes`, or by apoptosis once the strongest
//! remaining candidate scores below `apoptosis_ratio × root_energy`.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::knowledge::{KnowledgeGraph, RelationEdge, RelationKind};
use crate::memory::{MemoryEdge, WorkingMemory};
use crate::nucleation::Seed;

/// Configuration for crystal growth.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrystalConfig {
	/// Upper bound on crystal nodes, root included
	pub max_nodes: usize,
	/// Fraction of the root energy a candidate must reach
	pub apoptosis_ratio: f64,
	/// Source energy for concepts outside every seed
	pub default_energy: f64,
	/// Score factor for relations found in working memory
	pub repetition_penalty: f64,
}

impl Default for CrystalConfig {
	fn default() -> Self {
		Self {
			max_nodes: 8,
			apoptosis_ratio: 0.15,
			default_energy: 0.1,
			repetition_penalty: 0.5,
		}
	}
}

impl CrystalConfig {
	/// Validate growth parameters.
	///
	/// # Errors
	///
	/// Returns an error if `max_nodes` is zero or a ratio is outside its range.
	pub fn validate(&self) -> Result<()> {
		if self.max_nodes == 0 {
			return Err(EngineError::InvalidMaxNodes);
		}
		if !(0.0..=1.0).contains(&self.apoptosis_ratio) {
			return Err(EngineError::invalid_parameter(
				"apoptosis_ratio",
				format!("{} is outside [0, 1]", self.apoptosis_ratio),
			));
		}
		if !(self.default_energy.is_finite() && self.default_energy >= 0.0) {
			return Err(EngineError::invalid_parameter(
				"default_energy",
				format!("{} is not a non-negative number", self.default_energy),
			));
		}
		if !(0.0..=1.0).contains(&self.repetition_penalty) {
			return Err(EngineError::invalid_parameter(
				"repetition_penalty",
				format!("{} is outside [0, 1]", self.repetition_penalty),
			));
		}
		Ok(())
	}
}

// ============================================================================
// Classification
// ============================================================================

/// Structural classification of a crystal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Morphology {
	/// Two or more relations fan out of the root
	Parallel,
	/// An OPPOSES relation runs in both directions
	Entangled,
	/// A single chain away from the root
	Cascading,
}

impl Morphology {
	/// Classify an accepted edge set grown from `root`.
	#[must_use]
	pub fn classify(root: &str, edges: &[CrystalEdge]) -> Self {
		let reciprocal_opposes = edges.iter().any(|edge| {
			edge.kind == RelationKind::Opposes
				&& (edge.reciprocal
					|| edges.iter().any(|other| {
						other.kind == RelationKind::Opposes && other.from == edge.to && other.to == edge.from
					}))
		});
		if reciprocal_opposes {
			return Self::Entangled;
		}

		let fan_out = edges
			.iter()
			.filter(|edge| !edge.reciprocal && edge.from == root)
			.count();
		if fan_out >= 2 {
			Self::Parallel
		} else {
			Self::Cascading
		}
	}

	/// Lowercase name.
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Parallel => "parallel",
			Self::Entangled => "entangled",
			Self::Cascading => "cascading",
		}
	}
}

impl fmt::Display for Morphology {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Why growth stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationReason {
	/// No seed survived; the crystal is empty
	NoKnowledge,
	/// The root has no neighbors at all
	Exhausted,
	/// Node bound reached
	MaxNodes,
	/// The strongest remaining candidate is too weak, or none remain
	#[serde(rename = "score-below-apoptosis-ratio")]
	Apoptosis,
}

impl TerminationReason {
	/// Name used in reports.
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::NoKnowledge => "no-knowledge",
			Self::Exhausted => "exhausted",
			Self::MaxNodes => "max-nodes",
			Self::Apoptosis => "score-below-apoptosis-ratio",
		}
	}
}

impl fmt::Display for TerminationReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

// ============================================================================
// Crystal
// ============================================================================

/// A concept admitted into the crystal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrystalNode {
	/// Concept label
	pub concept: String,
	/// Energy used when this node is a growth source
	pub energy: f64,
	/// Edges between this node and the root
	pub depth: usize,
}

/// An accepted relation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrystalEdge {
	/// Source concept
	pub from: String,
	/// Target concept
	pub to: String,
	/// Relation kind
	pub kind: RelationKind,
	/// Relation weight
	pub weight: f64,
	/// Candidate score when admitted, after the repetition penalty
	pub score: f64,
	/// Whether the relation was already in working memory
	pub repeated: bool,
	/// Back edge of an admitted OPPOSES relation
	pub reciprocal: bool,
}

/// The rooted relational structure produced for one request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Crystal {
	/// Nodes in admission order; the first is the root
	pub nodes: Vec<CrystalNode>,
	/// Accepted relations in admission order
	pub edges: Vec<CrystalEdge>,
	/// Structural classification
	pub morphology: Morphology,
	/// Why growth stopped
	pub termination: TerminationReason,
}

impl Crystal {
	/// Zero-node crystal for requests without graph knowledge.
	#[must_use]
	pub const fn no_knowledge() -> Self {
		Self {
			nodes: Vec::new(),
			edges: Vec::new(),
			morphology: Morphology::Cascading,
			termination: TerminationReason::NoKnowledge,
		}
	}

	/// First admitted node.
	#[must_use]
	pub fn root(&self) -> Option<&CrystalNode> {
		self.nodes.first()
	}

	/// Number of nodes, root included.
	#[must_use]
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	/// Whether the crystal has no nodes.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Whether a concept was admitted.
	#[must_use]
	pub fn contains(&self, concept: &str) -> bool {
		self.nodes.iter().any(|node| node.concept == concept)
	}

	/// Node for a concept label.
	#[must_use]
	pub fn node(&self, concept: &str) -> Option<&CrystalNode> {
		self.nodes.iter().find(|node| node.concept == concept)
	}

	/// Nodes admitted after the root.
	#[must_use]
	pub fn admissions(&self) -> usize {
		self.nodes.len().saturating_sub(1)
	}

	/// Forward edges leaving `concept`.
	#[must_use]
	pub fn children(&self, concept: &str) -> Vec<&CrystalEdge> {
		self.edges
			.iter()
			.filter(|edge| !edge.reciprocal && edge.from == concept)
			.collect()
	}

	/// Deepest node distance from the root.
	#[must_use]
	pub fn depth(&self) -> usize {
		self.nodes.iter().map(|node| node.depth).max().unwrap_or(0)
	}

	/// Accepted relations as recorded in working memory.
	#[must_use]
	pub fn memory_edges(&self) -> Vec<MemoryEdge> {
		self.edges
			.iter()
			.filter(|edge| !edge.reciprocal)
			.map(|edge| MemoryEdge::new(&edge.from, &edge.to, edge.kind))
			.collect()
	}
}

// ============================================================================
// Growth
// ============================================================================

struct Candidate<'g> {
	/// Index of the crystal node the edge leaves from
	source: usize,
	edge: &'g RelationEdge,
	/// Unpenalized score, used for viability and ranking
	score: f64,
	repeated: bool,
	/// Repetition factor applied to the reported score
	factor: f64,
}

/// Fresh before repeated, then score, relation priority, target, source order.
fn candidate_order(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
	a.repeated
		.cmp(&b.repeated)
		.then_with(|| b.score.total_cmp(&a.score))
		.then_with(|| a.edge.kind.cmp_priority(b.edge.kind))
		.then_with(|| a.edge.target.cmp(&b.edge.target))
		.then_with(|| a.source.cmp(&b.source))
}

/// Grows seeds into crystals.
pub struct Crystallizer<'a> {
	graph: &'a KnowledgeGraph,
	config: &'a CrystalConfig,
}

impl<'a> Crystallizer<'a> {
	/// Bind the shared graph and configuration.
	#[must_use]
	pub const fn new(graph: &'a KnowledgeGraph, config: &'a CrystalConfig) -> Self {
		Self { graph, config }
	}

	/// Grow the top seed and record the accepted relations in `memory`.
	///
	/// Without a top seed the result is an empty `no-knowledge` crystal and
	/// memory is left untouched.
	pub fn grow(&self, top: Option<&Seed>, remaining: &[Seed], memory: &mut WorkingMemory) -> Crystal {
		let Some(top) = top else {
			debug!("no seed to grow");
			return Crystal::no_knowledge();
		};

		let root = top.root();
		let threshold = self.config.apoptosis_ratio * root.energy;
		let source_energy = |concept: &str| {
			std::iter::once(top)
				.chain(remaining)
				.find_map(|seed| seed.energy_of(concept))
				.unwrap_or(self.config.default_energy)
		};

		let mut nodes = vec![CrystalNode {
			concept: root.concept.clone(),
			energy: root.energy,
			depth: 0,
		}];
		let mut edges: Vec<CrystalEdge> = Vec::new();

		let termination = loop {
			if nodes.len() >= self.config.max_nodes {
				break TerminationReason::MaxNodes;
			}

			let candidates = self.candidates(&nodes, memory);
			if candidates.is_empty() {
				break if edges.is_empty() {
					TerminationReason::Exhausted
				} else {
					TerminationReason::Apoptosis
				};
			}

			let best = candidates
				.into_iter()
				.filter(|candidate| candidate.score >= threshold)
				.min_by(candidate_order);
			let Some(best) = best else {
				break TerminationReason::Apoptosis;
			};

			let score = best.score * best.factor;
			let depth = nodes[best.source].depth + 1;
			let from = nodes[best.source].concept.clone();
			let to = best.edge.target.clone();
			nodes.push(CrystalNode {
				concept: to.clone(),
				energy: source_energy(&to),
				depth,
			});
			edges.push(CrystalEdge {
				from: from.clone(),
				to: to.clone(),
				kind: best.edge.kind,
				weight: best.edge.weight,
				score,
				repeated: best.repeated,
				reciprocal: false,
			});
			if best.edge.kind.is_symmetric() {
				edges.push(CrystalEdge {
					from: to,
					to: from,
					kind: best.edge.kind,
					weight: best.edge.weight,
					score,
					repeated: best.repeated,
					reciprocal: true,
				});
			}
		};

		let morphology = Morphology::classify(&root.concept, &edges);
		let crystal = Crystal {
			nodes,
			edges,
			morphology,
			termination,
		};

		let turn = memory.record(crystal.memory_edges(), morphology);
		debug!(
			root = %root.concept,
			nodes = crystal.len(),
			morphology = %morphology,
			termination = %termination,
			turn,
			"crystal grown"
		);
		crystal
	}

	/// Every graph neighbor of a crystal node that is not yet in the crystal.
	fn candidates(&self, nodes: &[CrystalNode], memory: &WorkingMemory) -> Vec<Candidate<'a>> {
		let mut candidates = Vec::new();
		for (source, node) in nodes.iter().enumerate() {
			for edge in self.graph.neighbors(&node.concept) {
				if nodes.iter().any(|n| n.concept == edge.target) {
					continue;
				}
				let factor = memory.repetition_factor(
					&edge.source,
					&edge.target,
					edge.kind,
					self.config.repetition_penalty,
				);
				candidates.push(Candidate {
					source,
					edge,
					score: node.energy * edge.weight,
					repeated: factor.is_some(),
					factor: factor.unwrap_or(1.0),
				});
			}
		}
		candidates
	}
}
