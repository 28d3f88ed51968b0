//! End-to-end generation behavior.

#![allow(clippy::expect_used)]

use std::sync::Arc;

use cce_core::{
	Engine, EngineConfig, EngineError, GenerateRequest, KnowledgeGraph, MemoryEdge, Morphology,
	RelationKind, RelationTriple, TerminationReason, WorkingMemory,
};
use pretty_assertions::assert_eq;

fn engine_with(triples: &[(&str, &str, &str, f64)], config: EngineConfig) -> Engine {
	let triples = triples
		.iter()
		.map(|&(s, k, t, w)| RelationTriple::parse(s, k, t, w).expect("known relation kind"));
	let graph = KnowledgeGraph::from_triples(triples).expect("valid graph");
	Engine::new(Arc::new(graph), config).expect("valid config")
}

fn engine(triples: &[(&str, &str, &str, f64)]) -> Engine {
	engine_with(triples, EngineConfig::default())
}

fn stille() -> Engine {
	engine(&[
		("Stille", "NEEDS", "Ruhe", 0.8),
		("Stille", "CAUSES", "Erkenntnis", 0.6),
	])
}

/// (from, kind, to) of every forward edge.
fn shape(engine: &Engine, request: &GenerateRequest, memory: &mut WorkingMemory) -> Vec<(String, RelationKind, String)> {
	let generation = engine.generate(request, memory).expect("valid request");
	generation
		.crystal
		.edges
		.iter()
		.filter(|edge| !edge.reciprocal)
		.map(|edge| (edge.from.clone(), edge.kind, edge.to.clone()))
		.collect()
}

#[test]
fn stille_scenario() {
	let engine = stille();
	let mut memory = WorkingMemory::default();
	let request = GenerateRequest::new(["Stille"])
		.with_emotion("neutral")
		.with_seed(42)
		.with_temperature(0.5);

	let generation = engine.generate(&request, &mut memory).expect("valid request");
	let crystal = &generation.crystal;

	assert_eq!(crystal.root().map(|n| n.concept.as_str()), Some("Stille"));
	let children: Vec<(&str, RelationKind)> = crystal
		.children("Stille")
		.into_iter()
		.map(|edge| (edge.to.as_str(), edge.kind))
		.collect();
	assert_eq!(
		children,
		vec![("Ruhe", RelationKind::Needs), ("Erkenntnis", RelationKind::Causes)]
	);
	assert_eq!(crystal.morphology, Morphology::Parallel);
	assert_eq!(crystal.termination.as_str(), "score-below-apoptosis-ratio");
	assert_eq!(memory.turn_count(), 1);
}

#[test]
fn identical_inputs_give_identical_crystals() {
	let engine = engine(&[
		("Mut", "LEADSTO", "Freiheit", 0.8),
		("Mut", "OPPOSES", "Angst", 0.7),
		("Freiheit", "NEEDS", "Verantwortung", 0.6),
		("Angst", "CAUSES", "Stillstand", 0.5),
		("Freiheit", "HAS", "Weite", 0.4),
	]);
	let request = GenerateRequest::new(["Mut"])
		.with_context(["Freiheit"])
		.with_emotion("hoffnungsvoll")
		.with_temperature(0.7)
		.with_seed(7);

	let mut first_memory = WorkingMemory::default();
	let mut second_memory = WorkingMemory::default();
	let first = engine.generate(&request, &mut first_memory).expect("valid request");
	let second = engine.generate(&request, &mut second_memory).expect("valid request");

	assert_eq!(first.crystal, second.crystal);
	assert_eq!(first_memory, second_memory);
}

#[test]
fn unknown_concepts_yield_no_knowledge() {
	let engine = stille();
	let mut memory = WorkingMemory::default();
	let request = GenerateRequest::new(["Quantenverschränkung"])
		.with_context(["Zeitreise"])
		.with_temperature(1.0);

	let generation = engine.generate(&request, &mut memory).expect("valid request");

	assert_eq!(generation.crystal.admissions(), 0);
	assert_eq!(generation.crystal.termination, TerminationReason::NoKnowledge);
	assert_eq!(generation.report.seeds, 0);
	assert!(memory.is_empty());
}

#[test]
fn repetition_selects_an_alternative() {
	let config = EngineConfig::from_json(r#"{"crystal": {"max_nodes": 2}}"#).expect("valid config");
	let engine = engine_with(
		&[("A", "CAUSES", "B", 0.9), ("A", "CAUSES", "C", 0.5)],
		config,
	);
	let request = GenerateRequest::new(["A"]);

	let mut memory = WorkingMemory::default();
	let _ = memory.record(vec![MemoryEdge::new("A", "B", RelationKind::Causes)], Morphology::Cascading);
	let mut replay = memory.clone();

	let first = shape(&engine, &request, &mut memory);
	let second = shape(&engine, &request, &mut replay);

	let expected = vec![("A".to_owned(), RelationKind::Causes, "C".to_owned())];
	assert_eq!(first, expected);
	assert_eq!(second, expected);
}

#[test]
fn repetition_falls_back_without_alternative() {
	let config = EngineConfig::from_json(r#"{"crystal": {"max_nodes": 2}}"#).expect("valid config");
	let engine = engine_with(&[("A", "CAUSES", "B", 0.9)], config);
	let request = GenerateRequest::new(["A"]);

	let mut memory = WorkingMemory::default();
	let _ = memory.record(vec![MemoryEdge::new("A", "B", RelationKind::Causes)], Morphology::Cascading);

	let edges = shape(&engine, &request, &mut memory);
	assert_eq!(edges, vec![("A".to_owned(), RelationKind::Causes, "B".to_owned())]);
}

#[test]
fn morphology_classification() {
	let cascading = engine(&[("A", "CAUSES", "B", 0.9), ("B", "CAUSES", "C", 0.9)]);
	let parallel = engine(&[("A", "HAS", "B", 0.7), ("A", "HAS", "C", 0.6)]);
	let entangled = engine(&[("A", "OPPOSES", "B", 0.8)]);
	let request = GenerateRequest::new(["A"]).with_temperature(1.0);

	let classify = |engine: &Engine| {
		engine
			.generate(&request, &mut WorkingMemory::default())
			.expect("valid request")
			.crystal
			.morphology
	};

	assert_eq!(classify(&cascading), Morphology::Cascading);
	assert_eq!(classify(&parallel), Morphology::Parallel);
	assert_eq!(classify(&entangled), Morphology::Entangled);
}

#[test]
fn corrupt_memory_is_reset() {
	let engine = stille();
	let corrupt = r#"{
		"capacity": 5,
		"frames": [{"turn": 9, "edges": [{"source": "A", "target": "A", "kind": "HAS"}], "morphology": "parallel"}],
		"turn": 2
	}"#;
	let mut memory: WorkingMemory = serde_json::from_str(corrupt).expect("well-formed json");

	let generation = engine
		.generate(&GenerateRequest::new(["Stille"]), &mut memory)
		.expect("corruption is recovered");

	assert!(generation.report.memory_reset);
	assert_eq!(memory.turn_count(), 1);
	assert!(memory.validate().is_ok());
}

#[test]
fn exhausted_turn_counter_is_reset() {
	let engine = stille();
	let mut memory: WorkingMemory =
		serde_json::from_str(r#"{"capacity": 5, "frames": [], "turn": 18446744073709551615}"#)
			.expect("well-formed json");

	let generation = engine
		.generate(&GenerateRequest::new(["Stille"]), &mut memory)
		.expect("corruption is recovered");

	assert!(generation.report.memory_reset);
	assert_eq!(memory.turn_count(), 1);
	assert!(memory.validate().is_ok());
}

#[test]
fn labels_match_regardless_of_case() {
	let engine = stille();
	let canonical = engine
		.generate(&GenerateRequest::new(["Stille"]), &mut WorkingMemory::default())
		.expect("valid request")
		.crystal;

	for spelling in ["stille", " STILLE ", "sTiLLe"] {
		let crystal = engine
			.generate(&GenerateRequest::new([spelling]), &mut WorkingMemory::default())
			.expect("valid request")
			.crystal;
		assert_eq!(crystal, canonical, "{spelling:?}");
	}
	assert_eq!(canonical.root().map(|n| n.concept.as_str()), Some("Stille"));
	assert_ne!(canonical.termination, TerminationReason::NoKnowledge);

	// Memory recorded under one spelling penalizes the relation under another.
	let mut memory = WorkingMemory::default();
	let _ = engine
		.generate(&GenerateRequest::new(["Stille"]), &mut memory)
		.expect("valid request");
	assert!(memory.contains("STILLE", "ruhe", RelationKind::Needs));
}

#[test]
fn budget_overrun_is_flagged_without_changing_results() {
	let graph = [
		("Stille", "NEEDS", "Ruhe", 0.8),
		("Stille", "CAUSES", "Erkenntnis", 0.6),
	];
	let unbudgeted = engine_with(
		&graph,
		EngineConfig {
			wall_clock_budget_ms: 60_000,
			..EngineConfig::default()
		},
	);
	let budgeted = engine_with(
		&graph,
		EngineConfig {
			wall_clock_budget_ms: 0,
			..EngineConfig::default()
		},
	);
	let request = GenerateRequest::new(["Stille"]).with_temperature(0.5);

	let relaxed = unbudgeted
		.generate(&request, &mut WorkingMemory::default())
		.expect("valid request");
	let rushed = budgeted
		.generate(&request, &mut WorkingMemory::default())
		.expect("valid request");

	assert!(!relaxed.report.budget_exceeded);
	assert!(rushed.report.budget_exceeded);
	assert_eq!(rushed.crystal, relaxed.crystal);
	assert_eq!(rushed.report.seeds, relaxed.report.seeds);
	assert_eq!(rushed.report.particles, relaxed.report.particles);
}

#[test]
fn malformed_requests_fail() {
	let engine = stille();
	let mut memory = WorkingMemory::default();

	let cases = [
		GenerateRequest::new(["Stille"]).with_temperature(-0.1),
		GenerateRequest::new(Vec::<&str>::new()),
		GenerateRequest::new([""]),
		GenerateRequest::new(["Stille"]).with_emotion("   "),
	];
	for request in &cases {
		let err = engine.generate(request, &mut memory).expect_err("invalid request");
		assert!(err.is_request_error() || matches!(err, EngineError::EmptyLabel));
	}
	assert!(memory.is_empty());
}

#[test]
fn report_covers_every_phase() {
	let engine = stille();
	let mut memory = WorkingMemory::default();
	let request = GenerateRequest::new(["Stille"]).with_emotion("neutral");

	let report = engine.generate(&request, &mut memory).expect("valid request").report;
	let phases: Vec<String> = report.phases.iter().map(|log| log.phase.to_string()).collect();

	assert_eq!(phases, vec!["plasma", "resonance", "nucleation", "crystallization"]);
	assert_eq!(report.particles, 3);
	assert_eq!(report.seeds, 1);
}

#[test]
fn sessions_serialize_requests() {
	let engine = Arc::new(engine(&[
		("A", "HAS", "B", 0.9),
		("A", "CAUSES", "C", 0.8),
		("B", "LEADSTO", "D", 0.7),
	]));
	let session = Arc::new(engine.new_session());

	let handles: Vec<_> = (0..4)
		.map(|_| {
			let engine = Arc::clone(&engine);
			let session = Arc::clone(&session);
			std::thread::spawn(move || {
				engine
					.generate_in_session(&GenerateRequest::new(["A"]), &session)
					.expect("valid request")
			})
		})
		.collect();
	for handle in handles {
		let _ = handle.join().expect("thread completes");
	}

	let memory = session.snapshot();
	assert_eq!(memory.turn_count(), 4);
	assert!(memory.validate().is_ok());
}
