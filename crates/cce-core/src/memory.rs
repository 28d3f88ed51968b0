//! Working Memory
//!
//! Session-scoped record of the structures produced by recent requests.
//! Holds at most `capacity` frames, oldest first; recording a frame beyond
//! capacity evicts the oldest one. Nucleation and crystallization consult it
//! to avoid repeating relations used in recent turns.
//!
//! Older frames fade. A relation last used `age` turns ago carries
//!
//! ```text
//! recency = decay_rate^age
//! factor  = 1 − (1 − penalty) × recency
//! ```
//!
//! so last turn's relations take the full penalty and older ones less.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::concept::{normalize_label, same_label};
use crate::crystallization::Morphology;
use crate::error::MemoryError;
use crate::knowledge::RelationKind;

/// Configuration for working memory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
	/// Number of recent frames retained
	pub capacity: usize,
	/// Per-turn fade of older frames, in `(0, 1]`
	pub decay_rate: f64,
}

impl Default for MemoryConfig {
	fn default() -> Self {
		Self {
			capacity: 5,
			decay_rate: default_decay_rate(),
		}
	}
}

const fn default_decay_rate() -> f64 {
	0.75
}

/// One accepted relation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryEdge {
	/// Source concept
	pub source: String,
	/// Target concept
	pub target: String,
	/// Relation kind
	pub kind: RelationKind,
}

impl MemoryEdge {
	/// Edge from borrowed labels.
	#[must_use]
	pub fn new(source: &str, target: &str, kind: RelationKind) -> Self {
		Self {
			source: source.to_owned(),
			target: target.to_owned(),
			kind,
		}
	}

	/// OPPOSES edges match in either orientation. Labels compare without case.
	#[must_use]
	pub fn matches(&self, source: &str, target: &str, kind: RelationKind) -> bool {
		if self.kind != kind {
			return false;
		}
		let forward = same_label(&self.source, source) && same_label(&self.target, target);
		forward
			|| (kind.is_symmetric()
				&& same_label(&self.source, target)
				&& same_label(&self.target, source))
	}
}

/// The relations and shape of one completed request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryFrame {
	/// Turn number, starting at 1
	pub turn: u64,
	/// Accepted relations
	pub edges: Vec<MemoryEdge>,
	/// Crystal shape of the turn
	pub morphology: Morphology,
}

/// Bounded, recency-ordered working memory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkingMemory {
	capacity: usize,
	frames: VecDeque<MemoryFrame>,
	turn: u64,
	#[serde(default = "default_decay_rate")]
	decay_rate: f64,
}

impl Default for WorkingMemory {
	fn default() -> Self {
		Self::from_config(&MemoryConfig::default())
	}
}

impl WorkingMemory {
	/// Empty memory holding at most `capacity` frames.
	#[must_use]
	pub fn new(capacity: usize) -> Self {
		Self::with_decay(capacity, default_decay_rate())
	}

	/// Empty memory with an explicit per-turn decay.
	#[must_use]
	pub fn with_decay(capacity: usize, decay_rate: f64) -> Self {
		Self {
			capacity,
			frames: VecDeque::with_capacity(capacity),
			turn: 0,
			decay_rate,
		}
	}

	/// Empty memory sized by the configuration.
	#[must_use]
	pub fn from_config(config: &MemoryConfig) -> Self {
		Self::with_decay(config.capacity, config.decay_rate)
	}

	/// Maximum number of frames.
	#[must_use]
	pub const fn capacity(&self) -> usize {
		self.capacity
	}

	/// Number of frames held.
	#[must_use]
	pub fn len(&self) -> usize {
		self.frames.len()
	}

	/// Whether no frame is held.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.frames.is_empty()
	}

	/// Per-turn fade of older frames.
	#[must_use]
	pub const fn decay_rate(&self) -> f64 {
		self.decay_rate
	}

	/// Turns recorded since creation or the last reset.
	#[must_use]
	pub const fn turn_count(&self) -> u64 {
		self.turn
	}

	/// Frames, oldest first.
	pub fn frames(&self) -> impl Iterator<Item = &MemoryFrame> {
		self.frames.iter()
	}

	/// Whether a relation was accepted in any retained turn.
	#[must_use]
	pub fn contains(&self, source: &str, target: &str, kind: RelationKind) -> bool {
		self.frames
			.iter()
			.flat_map(|frame| frame.edges.iter())
			.any(|edge| edge.matches(source, target, kind))
	}

	/// Recency of the latest turn that accepted a relation: 1.0 for the most
	/// recent turn, fading by the decay rate per turn since.
	#[must_use]
	pub fn recency(&self, source: &str, target: &str, kind: RelationKind) -> Option<f64> {
		let frame = self
			.frames
			.iter()
			.rev()
			.find(|frame| frame.edges.iter().any(|edge| edge.matches(source, target, kind)))?;
		let age = i32::try_from(self.turn.saturating_sub(frame.turn)).unwrap_or(i32::MAX);
		Some(self.decay_rate.powi(age))
	}

	/// Score factor for reusing a relation, or `None` if it is fresh.
	///
	/// `penalty` applies in full to last turn's relations and fades toward 1.0
	/// for older ones.
	#[must_use]
	pub fn repetition_factor(
		&self,
		source: &str,
		target: &str,
		kind: RelationKind,
		penalty: f64,
	) -> Option<f64> {
		self.recency(source, target, kind)
			.map(|recency| (penalty - 1.0).mul_add(recency, 1.0))
	}

	/// Record the accepted relations of one request.
	///
	/// Returns the new turn number, or `None` when `edges` is empty: an empty
	/// crystal leaves memory untouched.
	pub fn record(&mut self, edges: Vec<MemoryEdge>, morphology: Morphology) -> Option<u64> {
		if edges.is_empty() {
			return None;
		}
		self.turn = match self.turn.checked_add(1) {
			Some(turn) => turn,
			None => {
				self.frames.clear();
				1
			}
		};
		self.frames.push_back(MemoryFrame {
			turn: self.turn,
			edges,
			morphology,
		});
		while self.frames.len() > self.capacity {
			let _ = self.frames.pop_front();
		}
		Some(self.turn)
	}

	/// Forget every frame and restart the turn counter.
	pub fn reset(&mut self) {
		self.frames.clear();
		self.turn = 0;
	}

	/// Morphologies of retained turns, most recent first.
	#[must_use]
	pub fn recent_morphologies(&self) -> Vec<Morphology> {
		self.frames.iter().rev().map(|frame| frame.morphology).collect()
	}

	/// Check structural integrity.
	///
	/// # Errors
	///
	/// Returns the first [`MemoryError`] found.
	pub fn validate(&self) -> Result<(), MemoryError> {
		if self.capacity == 0 {
			return Err(MemoryError::ZeroCapacity);
		}
		if !(self.decay_rate > 0.0 && self.decay_rate <= 1.0) {
			return Err(MemoryError::InvalidDecayRate);
		}
		if self.turn == u64::MAX {
			return Err(MemoryError::TurnCounterExhausted);
		}
		if self.frames.len() > self.capacity {
			return Err(MemoryError::Overflow {
				len: self.frames.len(),
				capacity: self.capacity,
			});
		}

		let mut previous: Option<u64> = None;
		for frame in &self.frames {
			if let Some(previous) = previous {
				if frame.turn <= previous {
					return Err(MemoryError::TurnOrder {
						turn: frame.turn,
						previous,
					});
				}
			}
			if frame.turn > self.turn {
				return Err(MemoryError::TurnAhead {
					turn: frame.turn,
					counter: self.turn,
				});
			}
			for edge in &frame.edges {
				for label in [&edge.source, &edge.target] {
					if label.is_empty() || normalize_label(label) != *label {
						return Err(MemoryError::MalformedLabel {
							turn: frame.turn,
							label: label.clone(),
						});
					}
				}
				if edge.source == edge.target {
					return Err(MemoryError::SelfLoop {
						turn: frame.turn,
						label: edge.source.clone(),
					});
				}
			}
			previous = Some(frame.turn);
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn edge(source: &str, target: &str, kind: RelationKind) -> MemoryEdge {
		MemoryEdge::new(source, target, kind)
	}

	#[test]
	fn test_record_and_contains() {
		let mut memory = WorkingMemory::default();
		let turn = memory.record(vec![edge("A", "B", RelationKind::Causes)], Morphology::Cascading);

		assert_eq!(turn, Some(1));
		assert!(memory.contains("A", "B", RelationKind::Causes));
		assert!(!memory.contains("B", "A", RelationKind::Causes));
		assert!(!memory.contains("A", "B", RelationKind::Needs));
	}

	#[test]
	fn test_opposes_matches_either_orientation() {
		let mut memory = WorkingMemory::default();
		let _ = memory.record(vec![edge("Mut", "Angst", RelationKind::Opposes)], Morphology::Entangled);

		assert!(memory.contains("Angst", "Mut", RelationKind::Opposes));
		assert!(memory.contains("Mut", "Angst", RelationKind::Opposes));
	}

	#[test]
	fn test_empty_record_is_ignored() {
		let mut memory = WorkingMemory::default();
		assert_eq!(memory.record(Vec::new(), Morphology::Cascading), None);
		assert!(memory.is_empty());
		assert_eq!(memory.turn_count(), 0);
	}

	#[test]
	fn test_capacity_evicts_oldest() {
		let mut memory = WorkingMemory::new(2);
		let _ = memory.record(vec![edge("A", "B", RelationKind::Has)], Morphology::Cascading);
		let _ = memory.record(vec![edge("B", "C", RelationKind::Has)], Morphology::Parallel);
		let _ = memory.record(vec![edge("C", "D", RelationKind::Has)], Morphology::Entangled);

		assert_eq!(memory.len(), 2);
		assert_eq!(memory.turn_count(), 3);
		assert!(!memory.contains("A", "B", RelationKind::Has));
		assert!(memory.contains("C", "D", RelationKind::Has));
		assert_eq!(
			memory.recent_morphologies(),
			vec![Morphology::Entangled, Morphology::Parallel]
		);
		assert!(memory.validate().is_ok());
	}

	#[test]
	fn test_labels_match_without_case() {
		let mut memory = WorkingMemory::default();
		let _ = memory.record(vec![edge("Stille", "Ruhe", RelationKind::Needs)], Morphology::Cascading);
		assert!(memory.contains("stille", "RUHE", RelationKind::Needs));
	}

	#[test]
	fn test_older_frames_fade() {
		let mut memory = WorkingMemory::with_decay(5, 0.5);
		let _ = memory.record(vec![edge("A", "B", RelationKind::Has)], Morphology::Cascading);
		let _ = memory.record(vec![edge("B", "C", RelationKind::Has)], Morphology::Cascading);
		let _ = memory.record(vec![edge("C", "D", RelationKind::Has)], Morphology::Cascading);

		assert_eq!(memory.recency("C", "D", RelationKind::Has), Some(1.0));
		assert_eq!(memory.recency("B", "C", RelationKind::Has), Some(0.5));
		assert_eq!(memory.recency("A", "B", RelationKind::Has), Some(0.25));
		assert_eq!(memory.recency("D", "E", RelationKind::Has), None);

		let factor = |s: &str, t: &str| memory.repetition_factor(s, t, RelationKind::Has, 0.5);
		assert_eq!(factor("C", "D"), Some(0.5));
		assert_eq!(factor("A", "B"), Some(0.875));
		assert_eq!(factor("D", "E"), None);
	}

	#[test]
	fn test_reuse_refreshes_recency() {
		let mut memory = WorkingMemory::default();
		let _ = memory.record(vec![edge("A", "B", RelationKind::Has)], Morphology::Cascading);
		let _ = memory.record(vec![edge("B", "C", RelationKind::Has)], Morphology::Cascading);
		let _ = memory.record(vec![edge("A", "B", RelationKind::Has)], Morphology::Cascading);
		assert_eq!(memory.recency("A", "B", RelationKind::Has), Some(1.0));
	}

	#[test]
	fn test_exhausted_turn_counter_is_corrupt() {
		let json = r#"{"capacity": 5, "frames": [], "turn": 18446744073709551615}"#;
		let mut memory: WorkingMemory = serde_json::from_str(json).expect("valid json");
		assert_eq!(memory.validate(), Err(MemoryError::TurnCounterExhausted));

		assert_eq!(
			memory.record(vec![edge("A", "B", RelationKind::Has)], Morphology::Cascading),
			Some(1)
		);
		assert_eq!(memory.len(), 1);
		assert!(memory.validate().is_ok());
	}

	#[test]
	fn test_reset() {
		let mut memory = WorkingMemory::default();
		let _ = memory.record(vec![edge("A", "B", RelationKind::Has)], Morphology::Cascading);
		memory.reset();
		assert!(memory.is_empty());
		assert_eq!(memory.turn_count(), 0);
		assert!(!memory.contains("A", "B", RelationKind::Has));
	}

	#[test]
	fn test_validate_detects_corruption() {
		let json = r#"{
			"capacity": 3,
			"frames": [
				{"turn": 2, "edges": [{"source": "A", "target": "B", "kind": "HAS"}], "morphology": "cascading"},
				{"turn": 1, "edges": [{"source": "B", "target": "C", "kind": "HAS"}], "morphology": "cascading"}
			],
			"turn": 2
		}"#;
		let memory: WorkingMemory = serde_json::from_str(json).expect("valid json");
		assert_eq!(
			memory.validate(),
			Err(MemoryError::TurnOrder { turn: 1, previous: 2 })
		);

		let json = r#"{
			"capacity": 3,
			"frames": [
				{"turn": 1, "edges": [{"source": " A ", "target": "B", "kind": "HAS"}], "morphology": "parallel"}
			],
			"turn": 1
		}"#;
		let memory: WorkingMemory = serde_json::from_str(json).expect("valid json");
		assert!(matches!(memory.validate(), Err(MemoryError::MalformedLabel { .. })));

		assert_eq!(WorkingMemory::new(0).validate(), Err(MemoryError::ZeroCapacity));
		assert_eq!(
			WorkingMemory::with_decay(3, 0.0).validate(),
			Err(MemoryError::InvalidDecayRate)
		);
	}

	#[test]
	fn test_serde_roundtrip_preserves_turns() {
		let mut memory = WorkingMemory::new(3);
		let _ = memory.record(vec![edge("A", "B", RelationKind::LeadsTo)], Morphology::Cascading);
		let json = serde_json::to_string(&memory).expect("serialize");
		let restored: WorkingMemory = serde_json::from_str(&json).expect("deserialize");
		assert_eq!(restored, memory);
		assert_eq!(restored.turn_count(), 1);
	}
}
