//! Nucleation Engine
//!
//! Groups the active particles into seeds: connected components of mutually
//! related particles.
//!
//! Two particles are bonded when a graph relation joins them and
//!
//! `weight ≥ base_cutoff × (1 − T)`
//!
//! so hotter requests bond weaker relations. Seeds are ranked by
//!
//! `score = Σ energy(m) × weighted_degree(m)` over members `m`
//!
//! multiplied by the repetition factor of every bonding relation already
//! present in working memory (the penalty, faded for older turns). A seed whose members carry no graph knowledge
//! scores zero and is discarded.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codebook::{Codebook, HyperVector};
use crate::knowledge::{KnowledgeGraph, RelationEdge, RelationKind};
use crate::memory::WorkingMemory;
use crate::plasma::{by_energy, Particle, ParticleField};

/// Configuration for nucleation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NucleationConfig {
	/// Bonding cutoff at `T = 0`; scaled by `1 − T`
	pub base_cutoff: f64,
	/// Score factor per bonding relation found in working memory
	pub repetition_penalty: f64,
}

impl Default for NucleationConfig {
	fn default() -> Self {
		Self {
			base_cutoff: 0.3,
			repetition_penalty: 0.5,
		}
	}
}

/// A particle belonging to a seed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Member {
	/// Concept label
	pub concept: String,
	/// Particle energy
	pub energy: f64,
}

/// A cluster of mutually related particles that anchors crystal growth.
#[derive(Clone, Debug, PartialEq)]
pub struct Seed {
	/// Members by descending energy, ties by label; the first is the root
	pub members: Vec<Member>,
	/// Dominant relation kind of the cluster
	pub bonding: Option<RelationKind>,
	/// Ranking score
	pub score: f64,
	/// Score before the repetition penalty
	pub raw_score: f64,
	/// Whether any bonding relation was found in working memory
	pub penalized: bool,
	/// Relations bonding the members
	pub internal_edges: Vec<RelationEdge>,
	/// Bundled member vector
	pub centroid: HyperVector,
	/// Mean member similarity to the centroid
	pub cohesion: f64,
}

impl Seed {
	/// Highest-energy member.
	#[must_use]
	pub fn root(&self) -> &Member {
		&self.members[0]
	}

	/// Energy of a member, if present.
	#[must_use]
	pub fn energy_of(&self, concept: &str) -> Option<f64> {
		self.members
			.iter()
			.find(|member| member.concept == concept)
			.map(|member| member.energy)
	}

	/// Whether a concept is a member.
	#[must_use]
	pub fn contains(&self, concept: &str) -> bool {
		self.members.iter().any(|member| member.concept == concept)
	}

	/// Number of members.
	#[must_use]
	pub fn len(&self) -> usize {
		self.members.len()
	}

	/// Whether the seed has no members.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.members.is_empty()
	}
}

// ============================================================================
// Clustering
// ============================================================================

/// Disjoint-set forest over particle indices.
struct DisjointSet {
	parent: Vec<usize>,
	rank: Vec<u8>,
}

impl DisjointSet {
	fn new(n: usize) -> Self {
		Self {
			parent: (0..n).collect(),
			rank: vec![0; n],
		}
	}

	fn find(&mut self, mut x: usize) -> usize {
		while self.parent[x] != x {
			self.parent[x] = self.parent[self.parent[x]];
			x = self.parent[x];
		}
		x
	}

	fn union(&mut self, a: usize, b: usize) {
		let (ra, rb) = (self.find(a), self.find(b));
		if ra == rb {
			return;
		}
		match self.rank[ra].cmp(&self.rank[rb]) {
			Ordering::Less => self.parent[ra] = rb,
			Ordering::Greater => self.parent[rb] = ra,
			Ordering::Equal => {
				self.parent[rb] = ra;
				self.rank[ra] = self.rank[ra].saturating_add(1);
			}
		}
	}
}

/// Kind with the greatest cumulative weight, ties by relation priority.
fn dominant_kind(edges: &[RelationEdge]) -> Option<RelationKind> {
	let mut totals: BTreeMap<RelationKind, f64> = BTreeMap::new();
	for edge in edges {
		*totals.entry(edge.kind).or_insert(0.0) += edge.weight;
	}
	totals
		.into_iter()
		.min_by(|(ka, wa), (kb, wb)| wb.total_cmp(wa).then_with(|| ka.cmp_priority(*kb)))
		.map(|(kind, _)| kind)
}

/// Forms and ranks seeds from a particle field.
pub struct Nucleator<'a> {
	codebook: &'a Codebook,
	graph: &'a KnowledgeGraph,
	config: &'a NucleationConfig,
}

impl<'a> Nucleator<'a> {
	/// Bind the shared codebook, graph and configuration.
	#[must_use]
	pub const fn new(codebook: &'a Codebook, graph: &'a KnowledgeGraph, config: &'a NucleationConfig) -> Self {
		Self {
			codebook,
			graph,
			config,
		}
	}

	/// Bonding cutoff at temperature `T`.
	#[must_use]
	pub fn cutoff(&self, temperature: f64) -> f64 {
		self.config.base_cutoff * (1.0 - temperature)
	}

	/// Cluster the field into ranked seeds.
	///
	/// Returns seeds by descending score, ties broken by root label. When
	/// every seed is penalized the unpenalized scores rank them instead.
	#[must_use]
	pub fn cluster(&self, field: &ParticleField, memory: &WorkingMemory, temperature: f64) -> Vec<Seed> {
		let particles = field.particles();
		let index: HashMap<&str, usize> = particles
			.iter()
			.enumerate()
			.map(|(i, p)| (p.concept.as_str(), i))
			.collect();
		let cutoff = self.cutoff(temperature);

		let mut forest = DisjointSet::new(particles.len());
		let mut bonds: Vec<(usize, &RelationEdge)> = Vec::new();
		for (i, particle) in particles.iter().enumerate() {
			for edge in self.graph.neighbors(&particle.concept) {
				// Mirrored OPPOSES views would count the relation twice.
				if edge.reversed || edge.weight < cutoff {
					continue;
				}
				if let Some(&j) = index.get(edge.target.as_str()) {
					forest.union(i, j);
					bonds.push((i, edge));
				}
			}
		}

		let mut components: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
		for i in 0..particles.len() {
			let root = forest.find(i);
			components.entry(root).or_default().push(i);
		}
		let mut edges_by_component: HashMap<usize, Vec<RelationEdge>> = HashMap::new();
		for (i, edge) in bonds {
			let root = forest.find(i);
			edges_by_component.entry(root).or_default().push(edge.clone());
		}

		let mut seeds: Vec<Seed> = components
			.into_iter()
			.filter_map(|(root, members)| {
				let edges = edges_by_component.remove(&root).unwrap_or_default();
				let members: Vec<&Particle> = members.iter().map(|&i| &particles[i]).collect();
				self.build_seed(members, edges, memory)
			})
			.collect();

		if !seeds.is_empty() && seeds.iter().all(|seed| seed.penalized) {
			debug!(seeds = seeds.len(), "every seed repeats memory; using unpenalized scores");
			for seed in &mut seeds {
				seed.score = seed.raw_score;
			}
		}

		seeds.sort_by(|a, b| {
			b.score
				.total_cmp(&a.score)
				.then_with(|| a.root().concept.cmp(&b.root().concept))
		});

		debug!(
			particles = particles.len(),
			seeds = seeds.len(),
			cutoff,
			"nucleation complete"
		);
		seeds
	}

	fn build_seed(
		&self,
		mut members: Vec<&Particle>,
		edges: Vec<RelationEdge>,
		memory: &WorkingMemory,
	) -> Option<Seed> {
		members.sort_by(|a, b| by_energy(a, b));

		let raw_score: f64 = members
			.iter()
			.map(|p| p.energy * self.graph.weighted_degree(&p.concept))
			.sum();
		if raw_score <= 0.0 {
			return None;
		}

		let mut score = raw_score;
		let mut penalized = false;
		for edge in &edges {
			if let Some(factor) =
				memory.repetition_factor(&edge.source, &edge.target, edge.kind, self.config.repetition_penalty)
			{
				score *= factor;
				penalized = true;
			}
		}

		let bonding = if edges.is_empty() {
			self.graph
				.neighbors(&members[0].concept)
				.first()
				.map(|edge| edge.kind)
		} else {
			dominant_kind(&edges)
		};

		let vectors: Vec<&HyperVector> = members.iter().map(|p| &p.vector).collect();
		let centroid = self.codebook.bundle(&vectors)?;
		#[allow(clippy::cast_precision_loss)]
		let cohesion =
			vectors.iter().map(|v| v.similarity(&centroid)).sum::<f64>() / vectors.len() as f64;

		Some(Seed {
			members: members
				.iter()
				.map(|p| Member {
					concept: p.concept.clone(),
					energy: p.energy,
				})
				.collect(),
			bonding,
			score,
			raw_score,
			penalized,
			internal_edges: edges,
			centroid,
			cohesion,
		})
	}
}
