//! Concept labels.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Normalize a raw label: trim and collapse internal whitespace runs to a
/// single space. Case is preserved for display.
#[must_use]
pub fn normalize_label(raw: &str) -> String {
	raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Identity key of a label: normalized and lower-cased.
///
/// Labels that differ only in case or spacing name the same concept.
#[must_use]
pub fn fold_label(raw: &str) -> String {
	normalize_label(raw).to_lowercase()
}

/// Whether two normalized labels name the same concept.
#[must_use]
pub fn same_label(a: &str, b: &str) -> bool {
	a == b || a.chars().flat_map(char::to_lowercase).eq(b.chars().flat_map(char::to_lowercase))
}

/// An immutable, normalized concept label with an optional weight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Concept {
	label: String,
	#[serde(default = "default_weight")]
	weight: f64,
}

const fn default_weight() -> f64 {
	1.0
}

impl Concept {
	/// A concept with the default weight of 1.0.
	#[must_use]
	pub fn new(label: &str) -> Self {
		Self {
			label: normalize_label(label),
			weight: default_weight(),
		}
	}

	/// A concept with an explicit weight.
	#[must_use]
	pub fn weighted(label: &str, weight: f64) -> Self {
		Self {
			label: normalize_label(label),
			weight,
		}
	}

	/// Normalized label.
	#[must_use]
	pub fn label(&self) -> &str {
		&self.label
	}

	/// Supplied weight.
	#[must_use]
	pub const fn weight(&self) -> f64 {
		self.weight
	}

	/// Reject blank labels and weights that are non-finite or not positive.
	///
	/// # Errors
	///
	/// Returns [`EngineError::EmptyLabel`] or [`EngineError::InvalidConceptWeight`].
	pub fn validate(&self) -> Result<()> {
		if self.label.is_empty() {
			return Err(EngineError::EmptyLabel);
		}
		if !self.weight.is_finite() || self.weight <= 0.0 {
			return Err(EngineError::InvalidConceptWeight {
				label: self.label.clone(),
				weight: self.weight,
			});
		}
		Ok(())
	}
}

impl From<&str> for Concept {
	fn from(label: &str) -> Self {
		Self::new(label)
	}
}

impl fmt::Display for Concept {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.label)
	}
}
