//! Plasma Field
//!
//! The transient set of active concept particles for one request.
//!
//! Seed concepts enter with their supplied weight as energy. Activation then
//! spreads outward through the knowledge graph, hop by hop:
//!
//! `score(edge) = affinity(sim(v_source, v_target)) × weight × T`
//!
//! Where:
//! - `affinity(s) = (1 + s) / 2` maps cosine similarity into `[0, 1]`
//! - `weight` = relation weight
//! - `T` = temperature in `[0, 1]`
//!
//! A neighbor is admitted when its score exceeds the admission threshold;
//! its energy is `parent_energy × score`. Admission depends only on the
//! edge score, so raising `T` can only add particles: the active set at a
//! lower temperature is always a subset of the set at a higher one.

use std::collections::{BTreeSet, HashMap};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codebook::{Codebook, HyperVector};
use crate::concept::{normalize_label, Concept};
use crate::knowledge::{KnowledgeGraph, RelationEdge, RelationKind};

/// Configuration for activation spreading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlasmaConfig {
	/// Minimum activation score for a neighbor to be admitted
	pub admission_threshold: f64,
	/// Maximum hops away from a seed concept
	pub max_hops: usize,
}

impl Default for PlasmaConfig {
	fn default() -> Self {
		Self {
			admission_threshold: 0.05,
			max_hops: 2,
		}
	}
}

/// How a particle entered the plasma.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
	/// Supplied by the request
	Seed,
	/// Admitted by spreading activation
	Spread,
}

/// One active concept.
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
	/// Concept label
	pub concept: String,
	/// Codebook vector of the label
	pub vector: HyperVector,
	/// Non-negative energy
	pub energy: f64,
	/// Seed or spread
	pub origin: Origin,
	/// Hops from the nearest seed (0 for seeds)
	pub hop: usize,
	/// Particle whose edge admitted this one
	pub parent: Option<String>,
	/// Relation kind of that edge
	pub via: Option<RelationKind>,
}

/// Energy descending, then label.
pub(crate) fn by_energy(a: &Particle, b: &Particle) -> std::cmp::Ordering {
	b.energy
		.total_cmp(&a.energy)
		.then_with(|| a.concept.cmp(&b.concept))
}

/// Map similarity in `[-1, 1]` to an affinity in `[0, 1]`.
#[inline]
#[must_use]
pub fn affinity(similarity: f64) -> f64 {
	((1.0 + similarity) / 2.0).clamp(0.0, 1.0)
}

/// Activation score of one spreading candidate.
#[inline]
#[must_use]
pub fn activation_score(source: &HyperVector, target: &HyperVector, weight: f64, temperature: f64) -> f64 {
	affinity(source.similarity(target)) * weight * temperature
}

// ============================================================================
// Particle Field
// ============================================================================

/// The active particle set, in admission order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParticleField {
	particles: Vec<Particle>,
	index: HashMap<String, usize>,
	temperature: f64,
}

impl ParticleField {
	fn with_temperature(temperature: f64) -> Self {
		Self {
			temperature,
			..Self::default()
		}
	}

	fn insert(&mut self, particle: Particle) -> usize {
		let idx = self.particles.len();
		let _ = self.index.insert(particle.concept.clone(), idx);
		self.particles.push(particle);
		idx
	}

	/// Particles in admission order.
	#[must_use]
	pub fn particles(&self) -> &[Particle] {
		&self.particles
	}

	/// Particle for a concept label.
	#[must_use]
	pub fn get(&self, concept: &str) -> Option<&Particle> {
		self.index.get(concept).map(|&idx| &self.particles[idx])
	}

	/// Whether a concept is active.
	#[must_use]
	pub fn contains(&self, concept: &str) -> bool {
		self.index.contains_key(concept)
	}

	/// Energy of an active concept.
	#[must_use]
	pub fn energy_of(&self, concept: &str) -> Option<f64> {
		self.get(concept).map(|p| p.energy)
	}

	/// Active concept labels, sorted.
	#[must_use]
	pub fn concepts(&self) -> BTreeSet<&str> {
		self.particles.iter().map(|p| p.concept.as_str()).collect()
	}

	/// Number of active particles.
	#[must_use]
	pub fn len(&self) -> usize {
		self.particles.len()
	}

	/// Whether no particle is active.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.particles.is_empty()
	}

	/// Temperature the field was activated at.
	#[must_use]
	pub const fn temperature(&self) -> f64 {
		self.temperature
	}

	/// Sum of all particle energies.
	#[must_use]
	pub fn total_energy(&self) -> f64 {
		self.particles.iter().map(|p| p.energy).sum()
	}

	/// Bundled representative vector of every active particle.
	#[must_use]
	pub fn centroid(&self, codebook: &Codebook) -> Option<HyperVector> {
		let refs: Vec<&HyperVector> = self.particles.iter().map(|p| &p.vector).collect();
		codebook.bundle(&refs)
	}

	/// Emotional coloring: particles the emotion label relates to gain
	/// `1 + gain × weight` energy per relation. The emotion itself is never
	/// added as a particle.
	pub fn resonate(&mut self, emotion: &str, graph: &KnowledgeGraph, gain: f64) {
		let emotion = normalize_label(emotion);
		for edge in graph.neighbors(&emotion) {
			if let Some(&idx) = self.index.get(&edge.target) {
				self.particles[idx].energy *= gain.mul_add(edge.weight, 1.0);
			}
		}
	}
}

// ============================================================================
// Activation
// ============================================================================

/// Builds particle fields from seed concepts.
pub struct PlasmaField<'a> {
	codebook: &'a Codebook,
	graph: &'a KnowledgeGraph,
	config: &'a PlasmaConfig,
}

struct Candidate<'e> {
	edge: &'e RelationEdge,
	vector: HyperVector,
	score: f64,
}

impl<'a> PlasmaField<'a> {
	/// Bind the shared codebook, graph and configuration.
	#[must_use]
	pub const fn new(codebook: &'a Codebook, graph: &'a KnowledgeGraph, config: &'a PlasmaConfig) -> Self {
		Self {
			codebook,
			graph,
			config,
		}
	}

	/// Activate the plasma for a set of seed concepts at temperature `T`.
	///
	/// Seed labels take the graph's spelling of the concept, and repeated
	/// labels keep their largest weight. The frontier of each
	/// hop is processed by descending energy, ties broken by label, and each
	/// particle's candidates are admitted in the graph's neighbor order.
	#[must_use]
	pub fn activate(&self, seeds: &[Concept], temperature: f64) -> ParticleField {
		let mut field = ParticleField::with_temperature(temperature);

		let mut weights: HashMap<&str, f64> = HashMap::new();
		for seed in seeds {
			let label = self.graph.resolve(seed.label()).unwrap_or(seed.label());
			let weight = weights.entry(label).or_insert(seed.weight());
			*weight = weight.max(seed.weight());
		}
		let mut seed_particles: Vec<Particle> = weights
			.into_iter()
			.map(|(label, energy)| Particle {
				concept: label.to_owned(),
				vector: self.codebook.encode(label),
				energy,
				origin: Origin::Seed,
				hop: 0,
				parent: None,
				via: None,
			})
			.collect();
		seed_particles.sort_by(by_energy);

		let mut frontier: Vec<usize> = seed_particles
			.into_iter()
			.map(|particle| field.insert(particle))
			.collect();

		for hop in 1..=self.config.max_hops {
			let mut admitted: Vec<usize> = Vec::new();

			for &idx in &frontier {
				let parent = &field.particles[idx];
				let parent_label = parent.concept.clone();
				let parent_energy = parent.energy;
				let candidates = self.score_candidates(parent, &field, temperature);

				for candidate in candidates {
					if candidate.score <= self.config.admission_threshold
						|| field.contains(&candidate.edge.target)
					{
						continue;
					}
					admitted.push(field.insert(Particle {
						concept: candidate.edge.target.clone(),
						vector: candidate.vector,
						energy: parent_energy * candidate.score,
						origin: Origin::Spread,
						hop,
						parent: Some(parent_label.clone()),
						via: Some(candidate.edge.kind),
					}));
				}
			}

			if admitted.is_empty() {
				break;
			}
			admitted.sort_by(|&a, &b| by_energy(&field.particles[a], &field.particles[b]));
			frontier = admitted;
		}

		debug!(
			particles = field.len(),
			temperature,
			"plasma activated"
		);
		field
	}

	/// Score every not-yet-active neighbor of `parent`, in neighbor order.
	fn score_candidates(&self, parent: &Particle, field: &ParticleField, temperature: f64) -> Vec<Candidate<'a>> {
		let edges: Vec<&'a RelationEdge> = self
			.graph
			.neighbors(&parent.concept)
			.iter()
			.filter(|edge| !field.contains(&edge.target))
			.collect();

		let score = |edge: &'a RelationEdge| {
			let vector = self.codebook.encode(&edge.target);
			let score = activation_score(&parent.vector, &vector, edge.weight, temperature);
			Candidate {
				edge,
				vector,
				score,
			}
		};

		#[cfg(feature = "parallel")]
		{
			edges.into_par_iter().map(score).collect()
		}
		#[cfg(not(feature = "parallel"))]
		{
			edges.into_iter().map(score).collect()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::knowledge::{RelationKind, RelationTriple};

	fn graph(triples: &[(&str, RelationKind, &str, f64)]) -> KnowledgeGraph {
		KnowledgeGraph::from_triples(
			triples
				.iter()
				.map(|&(s, k, t, w)| RelationTriple::new(s, k, t, w)),
		)
		.unwrap_or_default()
	}

	fn stille_graph() -> KnowledgeGraph {
		graph(&[
			("Stille", RelationKind::Needs, "Ruhe", 0.8),
			("Stille", RelationKind::Causes, "Erkenntnis", 0.6),
			("Ruhe", RelationKind::LeadsTo, "Klarheit", 0.9),
			("Klarheit", RelationKind::Has, "Licht", 0.9),
		])
	}

	fn activate(g: &KnowledgeGraph, seeds: &[Concept], temperature: f64) -> ParticleField {
		let codebook = Codebook::default();
		let config = PlasmaConfig::default();
		PlasmaField::new(&codebook, g, &config).activate(seeds, temperature)
	}

	#[test]
	fn test_affinity_range() {
		assert!((affinity(-1.0)).abs() < f64::EPSILON);
		assert!((affinity(0.0) - 0.5).abs() < f64::EPSILON);
		assert!((affinity(1.0) - 1.0).abs() < f64::EPSILON);
	}

	#[test]
	fn test_seeds_keep_supplied_energy() {
		let g = stille_graph();
		let field = activate(&g, &[Concept::weighted("Stille", 0.7)], 0.0);

		assert_eq!(field.len(), 1);
		let stille = field.get("Stille").map(|p| (p.energy, p.origin));
		assert_eq!(stille, Some((0.7, Origin::Seed)));
	}

	#[test]
	fn test_spreading_admits_neighbors() {
		let g = stille_graph();
		let field = activate(&g, &[Concept::new("Stille")], 0.5);

		assert!(field.contains("Ruhe"));
		assert!(field.contains("Erkenntnis"));

		let ruhe = field.get("Ruhe").map(|p| (p.origin, p.hop, p.via));
		assert_eq!(ruhe, Some((Origin::Spread, 1, Some(RelationKind::Needs))));

		// Spread energy is parent energy times a score bounded by weight × T.
		let energy = field.energy_of("Ruhe").unwrap_or(f64::NAN);
		assert!(energy > 0.0 && energy <= 0.8 * 0.5);
	}

	#[test]
	fn test_hop_bound() {
		let g = stille_graph();
		let field = activate(&g, &[Concept::new("Stille")], 1.0);

		// Stille -> Ruhe -> Klarheit is two hops; Licht would be a third.
		assert!(field.contains("Klarheit"));
		assert!(!field.contains("Licht"));
		assert!(field.particles().iter().all(|p| p.hop <= 2));
	}

	#[test]
	fn test_monotonic_in_temperature() {
		let g = stille_graph();
		let seeds = [Concept::new("Stille")];
		let temperatures = [0.0, 0.1, 0.2, 0.3, 0.5, 0.8, 1.0];

		for pair in temperatures.windows(2) {
			let cold = activate(&g, &seeds, pair[0]);
			let hot = activate(&g, &seeds, pair[1]);
			assert!(cold.concepts().is_subset(&hot.concepts()), "{pair:?}");
		}
	}

	#[test]
	fn test_activation_is_deterministic() {
		let g = stille_graph();
		let seeds = [Concept::new("Stille"), Concept::weighted("Ruhe", 0.4)];
		assert_eq!(activate(&g, &seeds, 0.6), activate(&g, &seeds, 0.6));
	}

	#[test]
	fn test_duplicate_seed_keeps_largest_weight() {
		let g = stille_graph();
		let seeds = [Concept::weighted("Stille", 0.3), Concept::weighted("Stille", 0.9)];
		let field = activate(&g, &seeds, 0.0);
		assert_eq!(field.len(), 1);
		assert_eq!(field.energy_of("Stille"), Some(0.9));
	}

	#[test]
	fn test_unknown_seed_does_not_spread() {
		let g = stille_graph();
		let field = activate(&g, &[Concept::new("Quanten")], 1.0);
		assert_eq!(field.len(), 1);
	}

	#[test]
	fn test_resonance_boosts_emotion_targets() {
		let g = graph(&[
			("Mut", RelationKind::LeadsTo, "Freiheit", 0.8),
			("hoffnungsvoll", RelationKind::Has, "Freiheit", 0.5),
		]);
		let mut field = activate(&g, &[Concept::new("Mut")], 0.5);
		let before = field.energy_of("Freiheit").unwrap_or(0.0);
		field.resonate("hoffnungsvoll", &g, 0.25);
		let after = field.energy_of("Freiheit").unwrap_or(0.0);

		assert!((after - before * 1.125).abs() < 1e-12);
		assert!(!field.contains("hoffnungsvoll"));
	}

	#[test]
	fn test_centroid_resembles_members() {
		let g = stille_graph();
		let field = activate(&g, &[Concept::new("Stille")], 0.5);
		let codebook = Codebook::default();
		let centroid = field.centroid(&codebook);

		let stille = field.get("Stille").map(|p| p.vector.clone());
		match (centroid, stille) {
			(Some(c), Some(s)) => assert!(c.similarity(&s) > 0.2),
			_ => panic!("expected centroid and seed vector"),
		}
	}
}
