//! Multi-Turn Conversation Example
//!
//! Asks the engine about the same concept several times within one session.
//! Working memory remembers the relations of earlier turns, so each answer
//! takes a different path through the graph until the alternatives run out.
//!
//! The graph is loaded from JSON triples, and the session memory is saved
//! and restored between turns the way a service would persist it.
//!
//! Run with: `cargo run --example conversation`

#![allow(clippy::expect_used)]

use std::sync::Arc;

use cce_core::{
	Engine, EngineConfig, GenerateRequest, KnowledgeGraph, RelationTriple, Session, WorkingMemory,
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const GRAPH: &str = r#"[
	{"subject": "Mut", "relation": "LEADSTO", "object": "Freiheit", "weight": 0.8},
	{"subject": "Mut", "relation": "NEEDS", "object": "Vertrauen", "weight": 0.7},
	{"subject": "Mut", "relation": "OPPOSES", "object": "Angst", "weight": 0.6},
	{"subject": "Freiheit", "relation": "HAS", "object": "Weite", "weight": 0.7},
	{"subject": "Angst", "relation": "CAUSES", "object": "Stillstand", "weight": 0.5},
	{"subject": "Vertrauen", "relation": "LEADSTO", "object": "Nähe", "weight": 0.6}
]"#;

fn main() {
	let subscriber = FmtSubscriber::builder()
		.with_env_filter(EnvFilter::from_default_env())
		.finish();
	tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

	println!("=== Conversation about \"Mut\" ===\n");

	let triples: Vec<RelationTriple> = serde_json::from_str(GRAPH).expect("valid triples");
	let graph = KnowledgeGraph::from_triples(triples).expect("valid graph");
	let config = EngineConfig::from_json(r#"{"crystal": {"max_nodes": 3}}"#).expect("valid config");
	let engine = Engine::new(Arc::new(graph), config).expect("valid config");

	let request = GenerateRequest::new(["Mut"])
		.with_emotion("hoffnungsvoll")
		.with_temperature(0.6);

	let mut saved = serde_json::to_string(&engine.new_memory()).expect("memory serializes");

	for turn in 1..=4 {
		// Restore the session from its saved form.
		let memory: WorkingMemory = serde_json::from_str(&saved).expect("memory deserializes");
		let session = Session::from_memory(memory);

		let generation = engine
			.generate_in_session(&request, &session)
			.expect("valid request");
		let crystal = &generation.crystal;

		println!("Turn {turn}: {} ({})", crystal.morphology, crystal.termination);
		for edge in crystal.edges.iter().filter(|e| !e.reciprocal) {
			let marker = if edge.repeated { " (repeated)" } else { "" };
			println!("  {} -{}-> {}{marker}", edge.from, edge.kind, edge.to);
		}
		println!(
			"  {} particles, {} seeds, {:?}",
			generation.report.particles, generation.report.seeds, generation.report.elapsed
		);

		saved = serde_json::to_string(&session.snapshot()).expect("memory serializes");
	}

	let memory: WorkingMemory = serde_json::from_str(&saved).expect("memory deserializes");
	println!("\nRecent shapes: {:?}", memory.recent_morphologies());
}
