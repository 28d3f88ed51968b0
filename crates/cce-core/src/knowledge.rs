//! Knowledge Graph
//!
//! Static, read-only store of typed, weighted relations between concept
//! labels. Built once from `(source, kind, target, weight)` tuples and shared
//! across requests.
//!
//! OPPOSES is symmetric: an OPPOSES edge is listed under its source and, as a
//! mirrored view, under its target, so traversal works in both directions.
//!
//! Labels are matched case-insensitively. Each concept keeps the spelling it
//! first appeared with, and lookups by any other spelling resolve to it.
//!
//! Neighbor order is fixed: descending weight, then relation-kind priority,
//! then target label, then stored edges before mirrored ones. Every stage that
//! walks the graph inherits its determinism from this order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::concept::{fold_label, normalize_label};
use crate::error::{EngineError, Result};

// ============================================================================
// Relation Kinds
// ============================================================================

/// The five relation kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelationKind {
	/// Quartal HAS Zahlen
	Has,
	/// Einsamkeit CAUSES Schmerz
	Causes,
	/// Hoffnung OPPOSES Verzweiflung
	Opposes,
	/// Erfolg NEEDS Arbeit
	Needs,
	/// Mut LEADSTO Freiheit
	LeadsTo,
}

impl RelationKind {
	/// All kinds in tie-break priority order (strongest first).
	pub const BY_PRIORITY: [Self; 5] = [
		Self::Causes,
		Self::LeadsTo,
		Self::Opposes,
		Self::Needs,
		Self::Has,
	];

	/// Tie-break rank: CAUSES > LEADSTO > OPPOSES > NEEDS > HAS.
	///
	/// Lower rank wins.
	#[must_use]
	pub const fn priority_rank(self) -> u8 {
		match self {
			Self::Causes => 0,
			Self::LeadsTo => 1,
			Self::Opposes => 2,
			Self::Needs => 3,
			Self::Has => 4,
		}
	}

	/// Compare by priority, higher-priority kinds first.
	#[must_use]
	pub fn cmp_priority(self, other: Self) -> Ordering {
		self.priority_rank().cmp(&other.priority_rank())
	}

	/// Whether traversal is permitted in both directions.
	#[must_use]
	pub const fn is_symmetric(self) -> bool {
		matches!(self, Self::Opposes)
	}

	/// Canonical upper-case name.
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Has => "HAS",
			Self::Causes => "CAUSES",
			Self::Opposes => "OPPOSES",
			Self::Needs => "NEEDS",
			Self::LeadsTo => "LEADSTO",
		}
	}
}

impl fmt::Display for RelationKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for RelationKind {
	type Err = EngineError;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_ascii_uppercase().as_str() {
			"HAS" => Ok(Self::Has),
			"CAUSES" => Ok(Self::Causes),
			"OPPOSES" => Ok(Self::Opposes),
			"NEEDS" => Ok(Self::Needs),
			"LEADSTO" | "LEADS_TO" => Ok(Self::LeadsTo),
			_ => Err(EngineError::UnknownRelationKind(s.to_owned())),
		}
	}
}

// ============================================================================
// Edges
// ============================================================================

/// A relation edge as seen from its `source`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationEdge {
	/// Concept the edge leaves from
	pub source: String,
	/// Concept the edge points at
	pub target: String,
	/// Relation kind
	pub kind: RelationKind,
	/// Weight in `(0, 1]`
	pub weight: f64,
	/// True for the mirrored view of an OPPOSES edge stored the other way round
	pub reversed: bool,
}

impl RelationEdge {
	fn mirrored(&self) -> Self {
		Self {
			source: self.target.clone(),
			target: self.source.clone(),
			kind: self.kind,
			weight: self.weight,
			reversed: !self.reversed,
		}
	}
}

/// Deterministic neighbor order.
fn edge_order(a: &RelationEdge, b: &RelationEdge) -> Ordering {
	b.weight
		.total_cmp(&a.weight)
		.then_with(|| a.kind.cmp_priority(b.kind))
		.then_with(|| a.target.cmp(&b.target))
		.then_with(|| a.reversed.cmp(&b.reversed))
}

/// One input tuple for building the graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationTriple {
	/// Source concept
	#[serde(alias = "subject")]
	pub source: String,
	/// Relation kind
	pub relation: RelationKind,
	/// Target concept
	#[serde(alias = "object")]
	pub target: String,
	/// Weight in `(0, 1]`
	#[serde(default = "default_relation_weight")]
	pub weight: f64,
}

const fn default_relation_weight() -> f64 {
	1.0
}

impl RelationTriple {
	/// Build a triple.
	#[must_use]
	pub fn new(source: &str, relation: RelationKind, target: &str, weight: f64) -> Self {
		Self {
			source: source.to_owned(),
			relation,
			target: target.to_owned(),
			weight,
		}
	}

	/// Build a triple from an untyped relation name.
	///
	/// # Errors
	///
	/// Returns [`EngineError::UnknownRelationKind`] for an unrecognized name.
	pub fn parse(source: &str, relation: &str, target: &str, weight: f64) -> Result<Self> {
		Ok(Self::new(source, relation.parse()?, target, weight))
	}
}

// ============================================================================
// Graph
// ============================================================================

/// Summary counts of a graph.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
	/// Distinct concepts touched by at least one relation
	pub concepts: usize,
	/// Stored relations (OPPOSES counted once)
	pub relations: usize,
	/// Relations per kind
	pub by_kind: BTreeMap<RelationKind, usize>,
}

/// Read-only typed relation graph.
#[derive(Clone, Debug, Default)]
pub struct KnowledgeGraph {
	adjacency: HashMap<String, SmallVec<[RelationEdge; 8]>>,
	degree: HashMap<String, f64>,
	/// Folded label to canonical spelling
	spellings: HashMap<String, String>,
	stats: GraphStats,
}

/// Canonical spelling of `raw`, registering it if unseen.
fn canonical_spelling(spellings: &mut HashMap<String, String>, raw: &str) -> String {
	let label = normalize_label(raw);
	spellings
		.entry(label.to_lowercase())
		.or_insert(label)
		.clone()
}

impl KnowledgeGraph {
	/// Build a graph from relation tuples.
	///
	/// Labels are normalized, and spellings differing only in case collapse
	/// onto the first one seen. A repeated `(source, kind, target)` keeps its
	/// heaviest weight; for OPPOSES the pair is unordered.
	///
	/// # Errors
	///
	/// Returns an error for empty labels, self-loops or weights outside `(0, 1]`.
	pub fn from_triples<I>(triples: I) -> Result<Self>
	where
		I: IntoIterator<Item = RelationTriple>,
	{
		let mut unique: BTreeMap<(String, RelationKind, String), RelationEdge> = BTreeMap::new();
		let mut spellings: HashMap<String, String> = HashMap::new();

		for triple in triples {
			let source = canonical_spelling(&mut spellings, &triple.source);
			let target = canonical_spelling(&mut spellings, &triple.target);
			if source.is_empty() || target.is_empty() {
				return Err(EngineError::EmptyLabel);
			}
			if source == target {
				return Err(EngineError::invalid_parameter(
					"relation",
					format!("self-loop on `{source}`"),
				));
			}
			if !(triple.weight > 0.0 && triple.weight <= 1.0) {
				return Err(EngineError::InvalidRelationWeight {
					subject: source,
					kind: triple.relation.to_string(),
					object: target,
					weight: triple.weight,
				});
			}

			let key = if triple.relation.is_symmetric() && target < source {
				(target.clone(), triple.relation, source.clone())
			} else {
				(source.clone(), triple.relation, target.clone())
			};
			let edge = RelationEdge {
				source,
				target,
				kind: triple.relation,
				weight: triple.weight,
				reversed: false,
			};
			match unique.get(&key) {
				Some(existing) if existing.weight >= edge.weight => {}
				_ => {
					let _ = unique.insert(key, edge);
				}
			}
		}

		let mut graph = Self {
			spellings,
			..Self::default()
		};
		for edge in unique.into_values() {
			*graph.degree.entry(edge.source.clone()).or_insert(0.0) += edge.weight;
			*graph.degree.entry(edge.target.clone()).or_insert(0.0) += edge.weight;
			*graph.stats.by_kind.entry(edge.kind).or_insert(0) += 1;
			graph.stats.relations += 1;

			if edge.kind.is_symmetric() {
				graph
					.adjacency
					.entry(edge.target.clone())
					.or_default()
					.push(edge.mirrored());
			}
			graph
				.adjacency
				.entry(edge.source.clone())
				.or_default()
				.push(edge);
		}

		for edges in graph.adjacency.values_mut() {
			edges.sort_by(edge_order);
		}
		graph.stats.concepts = graph.degree.len();

		Ok(graph)
	}

	/// Canonical spelling of `label`, if any relation touches it.
	#[must_use]
	pub fn resolve(&self, label: &str) -> Option<&str> {
		if let Some((canonical, _)) = self.degree.get_key_value(label) {
			return Some(canonical.as_str());
		}
		self.spellings.get(&fold_label(label)).map(String::as_str)
	}

	/// Outgoing edges of `concept`, plus mirrored OPPOSES edges it is the
	/// target of, in deterministic order. Unknown concepts yield an empty slice.
	#[must_use]
	pub fn neighbors(&self, concept: &str) -> &[RelationEdge] {
		match self.resolve(concept).and_then(|label| self.adjacency.get(label)) {
			Some(edges) => edges,
			None => &[],
		}
	}

	/// Sum of the weights of every relation touching `concept`.
	#[must_use]
	pub fn weighted_degree(&self, concept: &str) -> f64 {
		self.resolve(concept)
			.and_then(|label| self.degree.get(label))
			.copied()
			.unwrap_or(0.0)
	}

	/// Whether any relation touches `concept`.
	#[must_use]
	pub fn contains(&self, concept: &str) -> bool {
		self.resolve(concept).is_some()
	}

	/// Targets reachable from `subject` through one relation kind, in neighbor order.
	#[must_use]
	pub fn query(&self, subject: &str, kind: RelationKind) -> Vec<(&str, f64)> {
		self.neighbors(subject)
			.iter()
			.filter(|edge| edge.kind == kind)
			.map(|edge| (edge.target.as_str(), edge.weight))
			.collect()
	}

	/// All concept labels, sorted.
	#[must_use]
	pub fn concepts(&self) -> Vec<&str> {
		let mut labels: Vec<&str> = self.degree.keys().map(String::as_str).collect();
		labels.sort_unstable();
		labels
	}

	/// Number of stored relations.
	#[must_use]
	pub const fn len(&self) -> usize {
		self.stats.relations
	}

	/// Whether the graph holds no relations.
	#[must_use]
	pub const fn is_empty(&self) -> bool {
		self.stats.relations == 0
	}

	/// Summary counts.
	#[must_use]
	pub const fn stats(&self) -> &GraphStats {
		&self.stats
	}
}
