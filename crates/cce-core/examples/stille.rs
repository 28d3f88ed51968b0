//! Crystallizing "Stille"
//!
//! Grows a crystal for a single intent concept and prints every stage of
//! the pipeline: active particles, ranked seeds and the final crystal.
//!
//! Run with: `RUST_LOG=cce_core=debug cargo run --example stille`

#![allow(clippy::expect_used)]

use cce_core::{
	Codebook, Concept, Crystallizer, EngineConfig, KnowledgeGraph, Nucleator, PlasmaField,
	RelationKind, RelationTriple, WorkingMemory,
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() {
	let subscriber = FmtSubscriber::builder()
		.with_env_filter(EnvFilter::from_default_env())
		.finish();
	tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

	println!("=== Crystallizing \"Stille\" ===\n");

	// Stille ──NEEDS 0.8──→ Ruhe ──LEADSTO 0.9──→ Klarheit
	//    └────CAUSES 0.6──→ Erkenntnis
	let graph = KnowledgeGraph::from_triples([
		RelationTriple::new("Stille", RelationKind::Needs, "Ruhe", 0.8),
		RelationTriple::new("Stille", RelationKind::Causes, "Erkenntnis", 0.6),
		RelationTriple::new("Ruhe", RelationKind::LeadsTo, "Klarheit", 0.9),
		RelationTriple::new("Lärm", RelationKind::Opposes, "Stille", 0.7),
	])
	.expect("valid graph");

	let stats = graph.stats();
	println!("Graph: {} concepts, {} relations", stats.concepts, stats.relations);
	for (kind, count) in &stats.by_kind {
		println!("  {:<8} {count}", kind.as_str());
	}

	let config = EngineConfig::default();
	let codebook = Codebook::default();
	let temperature = 0.5;
	let mut memory = WorkingMemory::default();

	// 1. Plasma
	let mut field = PlasmaField::new(&codebook, &graph, &config.plasma)
		.activate(&[Concept::new("Stille")], temperature);
	field.resonate("neutral", &graph, config.emotion_gain);

	println!("\nPlasma at T = {temperature}:");
	for particle in field.particles() {
		println!(
			"  {:<12} energy {:.3}  hop {}  via {:?}",
			particle.concept, particle.energy, particle.hop, particle.via
		);
	}

	// 2. Nucleation
	let seeds = Nucleator::new(&codebook, &graph, &config.nucleation).cluster(&field, &memory, temperature);

	println!("\nSeeds:");
	for seed in &seeds {
		let members: Vec<&str> = seed.members.iter().map(|m| m.concept.as_str()).collect();
		println!(
			"  root {:<10} score {:.3}  bonding {:?}  cohesion {:.2}  members {members:?}",
			seed.root().concept,
			seed.score,
			seed.bonding,
			seed.cohesion
		);
	}

	// 3. Crystallization
	let crystal = Crystallizer::new(&graph, &config.crystal).grow(
		seeds.first(),
		seeds.get(1..).unwrap_or_default(),
		&mut memory,
	);

	println!("\nCrystal ({}, {}):", crystal.morphology, crystal.termination);
	for edge in crystal.edges.iter().filter(|e| !e.reciprocal) {
		println!("  {} -{}-> {}  (score {:.3})", edge.from, edge.kind, edge.to, edge.score);
	}

	println!("\nAs JSON:");
	println!(
		"{}",
		serde_json::to_string_pretty(&crystal).expect("crystal serializes")
	);
}
