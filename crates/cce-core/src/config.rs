//! Engine configuration.
//!
//! Every stage owns its own `*Config`; [`EngineConfig`] composes them. All
//! fields have defaults, so partial JSON documents are accepted:
//!
//! ```rust
//! use cce_core::config::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{"crystal": {"max_nodes": 4}}"#).unwrap();
//! assert_eq!(config.crystal.max_nodes, 4);
//! assert_eq!(config.plasma.max_hops, 2);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codebook::DEFAULT_DIMENSION;
use crate::crystallization::CrystalConfig;
use crate::error::{EngineError, Result};
use crate::memory::MemoryConfig;
use crate::nucleation::NucleationConfig;
use crate::plasma::PlasmaConfig;

/// Configuration for the whole pipeline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
	/// Hypervector dimension
	pub dimension: usize,
	/// Weight factor applied to context concepts
	pub context_weight: f64,
	/// Energy gain for particles the emotion label relates to
	pub emotion_gain: f64,
	/// Wall-clock budget per request in milliseconds
	pub wall_clock_budget_ms: u64,
	/// Spreading activation
	pub plasma: PlasmaConfig,
	/// Seed clustering
	pub nucleation: NucleationConfig,
	/// Crystal growth
	pub crystal: CrystalConfig,
	/// Working memory bounds
	pub memory: MemoryConfig,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			dimension: DEFAULT_DIMENSION,
			context_weight: 0.6,
			emotion_gain: 0.25,
			wall_clock_budget_ms: 10,
			plasma: PlasmaConfig::default(),
			nucleation: NucleationConfig::default(),
			crystal: CrystalConfig::default(),
			memory: MemoryConfig::default(),
		}
	}
}

fn unit_interval(name: &'static str, value: f64) -> Result<()> {
	if (0.0..=1.0).contains(&value) {
		Ok(())
	} else {
		Err(EngineError::invalid_parameter(name, format!("{value} is outside [0, 1]")))
	}
}

impl EngineConfig {
	/// Parse and validate a JSON configuration document.
	///
	/// # Errors
	///
	/// Returns [`EngineError::ConfigParse`] for malformed JSON, or the first
	/// validation error.
	pub fn from_json(json: &str) -> Result<Self> {
		let config: Self = serde_json::from_str(json)?;
		config.validate()?;
		Ok(config)
	}

	/// Check every parameter range.
	///
	/// # Errors
	///
	/// Returns the first invalid parameter found.
	pub fn validate(&self) -> Result<()> {
		if self.dimension == 0 {
			return Err(EngineError::InvalidDimension);
		}
		unit_interval("context_weight", self.context_weight)?;
		if !(self.emotion_gain.is_finite() && self.emotion_gain >= 0.0) {
			return Err(EngineError::invalid_parameter(
				"emotion_gain",
				format!("{} is not a non-negative number", self.emotion_gain),
			));
		}
		unit_interval("plasma.admission_threshold", self.plasma.admission_threshold)?;
		unit_interval("nucleation.base_cutoff", self.nucleation.base_cutoff)?;
		unit_interval("nucleation.repetition_penalty", self.nucleation.repetition_penalty)?;
		if self.memory.capacity == 0 {
			return Err(EngineError::invalid_parameter("memory.capacity", "must be at least 1"));
		}
		if !(self.memory.decay_rate > 0.0 && self.memory.decay_rate <= 1.0) {
			return Err(EngineError::invalid_parameter(
				"memory.decay_rate",
				format!("{} is outside (0, 1]", self.memory.decay_rate),
			));
		}
		self.crystal.validate()
	}

	/// Wall-clock budget as a duration.
	#[must_use]
	pub const fn wall_clock_budget(&self) -> Duration {
		Duration::from_millis(self.wall_clock_budget_ms)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults_are_valid() {
		let config = EngineConfig::default();
		assert!(config.validate().is_ok());
		assert_eq!(config.dimension, 10_000);
		assert_eq!(config.crystal.max_nodes, 8);
		assert_eq!(config.wall_clock_budget(), Duration::from_millis(10));
	}

	#[test]
	fn test_partial_json() {
		let config = EngineConfig::from_json(r#"{"plasma": {"max_hops": 3}, "context_weight": 0.4}"#)
			.expect("valid config");
		assert_eq!(config.plasma.max_hops, 3);
		assert!((config.plasma.admission_threshold - 0.05).abs() < f64::EPSILON);
		assert!((config.context_weight - 0.4).abs() < f64::EPSILON);
		assert!((config.nucleation.base_cutoff - 0.3).abs() < f64::EPSILON);
	}

	#[test]
	fn test_invalid_values() {
		assert!(matches!(
			EngineConfig::from_json(r#"{"dimension": 0}"#),
			Err(EngineError::InvalidDimension)
		));
		assert!(matches!(
			EngineConfig::from_json(r#"{"crystal": {"max_nodes": 0}}"#),
			Err(EngineError::InvalidMaxNodes)
		));
		assert!(matches!(
			EngineConfig::from_json(r#"{"memory": {"capacity": 0}}"#),
			Err(EngineError::InvalidParameter { name: "memory.capacity", .. })
		));
		assert!(matches!(
			EngineConfig::from_json(r#"{"memory": {"decay_rate": 1.5}}"#),
			Err(EngineError::InvalidParameter { name: "memory.decay_rate", .. })
		));
		assert!(matches!(
			EngineConfig::from_json("{not json"),
			Err(EngineError::ConfigParse(_))
		));
	}
}
