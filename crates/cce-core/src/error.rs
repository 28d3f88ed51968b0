//! Error types for the crystallization engine.
//!
//! Only structurally invalid configuration or requests are fatal. Sparse data
//! (a concept missing from the graph) is never an error: it surfaces as an
//! empty crystal with a `no-knowledge` termination.

/// Fatal errors raised while validating configuration, graph data or a request.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
	/// Temperature outside the closed unit interval (or NaN).
	#[error("temperature must lie in [0, 1], got {0}")]
	TemperatureOutOfRange(f64),

	/// A crystal must be allowed at least its root node.
	#[error("max_nodes must be at least 1")]
	InvalidMaxNodes,

	/// Hypervector dimension of zero.
	#[error("vector dimension must be at least 1")]
	InvalidDimension,

	/// The request carries no intent concepts.
	#[error("request carries no intent concepts")]
	EmptyIntent,

	/// A concept label that is empty after normalization.
	#[error("concept label is empty")]
	EmptyLabel,

	/// Concept weight that is negative, zero or not finite.
	#[error("concept `{label}` has invalid weight {weight}")]
	InvalidConceptWeight {
		/// Normalized concept label
		label: String,
		/// Offending weight
		weight: f64,
	},

	/// Relation weight outside `(0, 1]`.
	#[error("relation {subject} -{kind}-> {object} has weight {weight} outside (0, 1]")]
	InvalidRelationWeight {
		/// Source concept
		subject: String,
		/// Relation kind name
		kind: String,
		/// Target concept
		object: String,
		/// Offending weight
		weight: f64,
	},

	/// Relation kind name that is not one of the five known kinds.
	#[error("unknown relation kind `{0}`")]
	UnknownRelationKind(String),

	/// A tuning parameter outside its valid range.
	#[error("invalid parameter `{name}`: {reason}")]
	InvalidParameter {
		/// Parameter name
		name: &'static str,
		/// Why it was rejected
		reason: String,
	},

	/// Configuration JSON could not be parsed.
	#[error("failed to parse configuration: {0}")]
	ConfigParse(#[from] serde_json::Error),
}

impl EngineError {
	/// Check if this error was caused by the request rather than engine configuration.
	#[must_use]
	pub fn is_request_error(&self) -> bool {
		matches!(
			self,
			Self::TemperatureOutOfRange(_)
				| Self::EmptyIntent
				| Self::EmptyLabel
				| Self::InvalidConceptWeight { .. }
		)
	}

	pub(crate) fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
		Self::InvalidParameter {
			name,
			reason: reason.into(),
		}
	}
}

/// Structural corruption found in externally supplied working memory.
///
/// Never propagated out of generation: the engine resets the memory instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
	/// Memory with zero capacity can never hold a frame.
	#[error("working memory capacity is zero")]
	ZeroCapacity,

	/// Decay rate outside `(0, 1]`.
	#[error("working memory decay rate is outside (0, 1]")]
	InvalidDecayRate,

	/// The turn counter cannot advance.
	#[error("working memory turn counter is exhausted")]
	TurnCounterExhausted,

	/// More frames than the capacity allows.
	#[error("working memory holds {len} frames but capacity is {capacity}")]
	Overflow {
		/// Frames present
		len: usize,
		/// Configured capacity
		capacity: usize,
	},

	/// Frames are not in strictly increasing turn order.
	#[error("frame for turn {turn} follows turn {previous}")]
	TurnOrder {
		/// Turn of the offending frame
		turn: u64,
		/// Turn of the frame before it
		previous: u64,
	},

	/// A frame claims a turn beyond the memory's turn counter.
	#[error("frame for turn {turn} is ahead of the turn counter {counter}")]
	TurnAhead {
		/// Turn of the offending frame
		turn: u64,
		/// Memory turn counter
		counter: u64,
	},

	/// A recorded edge with an empty or unnormalized label.
	#[error("frame for turn {turn} records a malformed label `{label}`")]
	MalformedLabel {
		/// Turn of the offending frame
		turn: u64,
		/// The label as stored
		label: String,
	},

	/// A recorded edge that loops onto its own source.
	#[error("frame for turn {turn} records a self-loop on `{label}`")]
	SelfLoop {
		/// Turn of the offending frame
		turn: u64,
		/// Looping concept
		label: String,
	},
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
