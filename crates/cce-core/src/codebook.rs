//! Hyperdimensional Codebook
//!
//! Every concept label maps to a bipolar vector in `{-1, +1}^D`, with
//! `D = 10_000` by default. The mapping is a pure function of the label and
//! the global seed, so vectors are never stored: they can be regenerated at
//! any time.
//!
//! Properties this module relies on:
//! - Independent random vectors in high dimensions are nearly orthogonal
//!   (similarity ≈ 0, standard deviation `1/√D`)
//! - **Binding** (element-wise multiply) yields a vector dissimilar to both
//!   inputs, and is its own inverse: `bind(bind(a, b), b) = a`
//! - **Bundling** (element-wise majority) yields a vector similar to every
//!   input
//! - **Permutation** (cyclic rotation) encodes position in a sequence
//!
//! Vectors are bit-packed: a clear bit is `+1`, a set bit is `-1`. With that
//! encoding binding is XOR and the dot product falls out of a popcount:
//!
//! ```text
//! dot(a, b) = D - 2 × hamming(a, b)
//! sim(a, b) = dot(a, b) / D
//! ```

use std::fmt;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::concept::fold_label;
use crate::error::{EngineError, Result};

/// Default hypervector dimension.
pub const DEFAULT_DIMENSION: usize = 10_000;

/// Default global seed.
pub const DEFAULT_SEED: u64 = 42;

/// Reserved label for the vector that breaks majority ties during bundling.
const TIE_BREAK_LABEL: &str = "\u{0}bundle-tie-break";

const WORD_BITS: usize = 64;

// ============================================================================
// HyperVector
// ============================================================================

/// A bit-packed bipolar hypervector.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HyperVector {
	dim: usize,
	words: Vec<u64>,
}

impl HyperVector {
	/// The all-`+1` vector of the given dimension.
	#[must_use]
	pub fn positive(dim: usize) -> Self {
		Self {
			dim,
			words: vec![0; word_count(dim)],
		}
	}

	/// Number of components.
	#[inline]
	#[must_use]
	pub const fn dim(&self) -> usize {
		self.dim
	}

	/// Component `i` as `+1` or `-1`. Out-of-range components read as `+1`.
	#[inline]
	#[must_use]
	pub fn get(&self, i: usize) -> i8 {
		if i < self.dim && (self.words[i / WORD_BITS] >> (i % WORD_BITS)) & 1 == 1 {
			-1
		} else {
			1
		}
	}

	#[inline]
	fn set(&mut self, i: usize, component: i8) {
		let mask = 1u64 << (i % WORD_BITS);
		if component < 0 {
			self.words[i / WORD_BITS] |= mask;
		} else {
			self.words[i / WORD_BITS] &= !mask;
		}
	}

	/// Unpack into one `i8` per component.
	#[must_use]
	pub fn to_bipolar(&self) -> Vec<i8> {
		(0..self.dim).map(|i| self.get(i)).collect()
	}

	/// Number of components where the two vectors differ.
	///
	/// Returns `None` when the dimensions differ.
	#[must_use]
	pub fn hamming(&self, other: &Self) -> Option<u32> {
		if self.dim != other.dim {
			return None;
		}

		Some(
			self.words
				.iter()
				.zip(&other.words)
				.map(|(a, b)| (a ^ b).count_ones())
				.sum(),
		)
	}

	/// Normalized dot product in `[-1, 1]`.
	///
	/// Zero-dimensional or mismatched vectors have similarity 0.
	#[must_use]
	pub fn similarity(&self, other: &Self) -> f64 {
		if self.dim == 0 {
			return 0.0;
		}

		self.hamming(other).map_or(0.0, |hamming| {
			#[allow(clippy::cast_precision_loss)]
			let dim = self.dim as f64;
			2.0f64.mul_add(-f64::from(hamming), dim) / dim
		})
	}

	fn mask_tail(&mut self) {
		let rem = self.dim % WORD_BITS;
		if rem != 0 {
			if let Some(last) = self.words.last_mut() {
				*last &= (1u64 << rem) - 1;
			}
		}
	}
}

impl fmt::Debug for HyperVector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("HyperVector")
			.field("dim", &self.dim)
			.field("head", &format_args!("{:016x}", self.words.first().copied().unwrap_or(0)))
			.finish()
	}
}

const fn word_count(dim: usize) -> usize {
	dim.div_ceil(WORD_BITS)
}

/// Cosine similarity between two hypervectors.
#[inline]
#[must_use]
pub fn similarity(a: &HyperVector, b: &HyperVector) -> f64 {
	a.similarity(b)
}

// ============================================================================
// Codebook
// ============================================================================

/// Deterministic label → hypervector mapping.
///
/// Cheap to construct: it holds only the dimension and the global seed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Codebook {
	dim: usize,
	seed: u64,
}

impl Default for Codebook {
	fn default() -> Self {
		Self {
			dim: DEFAULT_DIMENSION,
			seed: DEFAULT_SEED,
		}
	}
}

impl Codebook {
	/// Create a codebook for the given dimension and global seed.
	///
	/// # Errors
	///
	/// Returns [`EngineError::InvalidDimension`] if `dim` is zero.
	pub fn new(dim: usize, seed: u64) -> Result<Self> {
		if dim == 0 {
			return Err(EngineError::InvalidDimension);
		}
		Ok(Self { dim, seed })
	}

	/// Vector dimension.
	#[must_use]
	pub const fn dim(&self) -> usize {
		self.dim
	}

	/// Global seed.
	#[must_use]
	pub const fn seed(&self) -> u64 {
		self.seed
	}

	/// Encode a label.
	///
	/// The first 8 bytes of the folded label's SHA-256 digest, XOR the global
	/// seed, seed a ChaCha8 stream that fills the packed words. Identical
	/// `(label, seed)` pairs always give bit-identical vectors, whatever the
	/// label's case.
	#[must_use]
	pub fn encode(&self, label: &str) -> HyperVector {
		let digest = Sha256::digest(fold_label(label).as_bytes());
		let mut head = [0u8; 8];
		head.copy_from_slice(&digest[..8]);
		let label_seed = u64::from_le_bytes(head) ^ self.seed;

		let mut rng = ChaCha8Rng::seed_from_u64(label_seed);
		let mut vector = HyperVector::positive(self.dim);
		for word in &mut vector.words {
			*word = rng.next_u64();
		}
		vector.mask_tail();
		vector
	}

	/// Role-filler binding via element-wise multiplication.
	///
	/// Vectors are expected to share a dimension; components of `a` beyond
	/// `b`'s length pass through unchanged.
	#[must_use]
	pub fn bind(a: &HyperVector, b: &HyperVector) -> HyperVector {
		let mut out = a.clone();
		for (word, other) in out.words.iter_mut().zip(&b.words) {
			*word ^= other;
		}
		out.mask_tail();
		out
	}

	/// Recover one operand of a binding given the other.
	///
	/// Binding is self-inverse, so this is [`Codebook::bind`] again.
	#[must_use]
	pub fn unbind(bound: &HyperVector, key: &HyperVector) -> HyperVector {
		Self::bind(bound, key)
	}

	/// Superposition via element-wise majority.
	///
	/// Ties (possible with an even number of inputs) take the component of a
	/// fixed tie-break vector, so the result stays deterministic.
	///
	/// Returns `None` for an empty input.
	#[must_use]
	pub fn bundle(&self, vectors: &[&HyperVector]) -> Option<HyperVector> {
		let first = vectors.first()?;
		let dim = first.dim();

		let mut sums = vec![0i32; dim];
		for vector in vectors {
			for (i, sum) in sums.iter_mut().enumerate() {
				*sum += i32::from(vector.get(i));
			}
		}

		let tie_break = self.encode(TIE_BREAK_LABEL);
		let mut out = HyperVector::positive(dim);
		for (i, &sum) in sums.iter().enumerate() {
			let component = match sum.cmp(&0) {
				std::cmp::Ordering::Greater => 1,
				std::cmp::Ordering::Less => -1,
				std::cmp::Ordering::Equal => tie_break.get(i),
			};
			out.set(i, component);
		}
		Some(out)
	}

	/// Cyclic permutation by `shift` positions.
	///
	/// `permute(v, k)` is nearly orthogonal to `v` for `k ≠ 0 (mod D)`.
	#[must_use]
	pub fn permute(v: &HyperVector, shift: usize) -> HyperVector {
		let dim = v.dim();
		if dim == 0 {
			return v.clone();
		}

		let shift = shift % dim;
		let mut out = HyperVector::positive(dim);
		for i in 0..dim {
			out.set((i + shift) % dim, v.get(i));
		}
		out
	}

	/// Encode an ordered label list: each label is permuted by its position,
	/// then all are bundled.
	#[must_use]
	pub fn encode_sequence(&self, labels: &[&str]) -> Option<HyperVector> {
		let positioned: Vec<HyperVector> = labels
			.iter()
			.enumerate()
			.map(|(i, label)| Self::permute(&self.encode(label), i))
			.collect();
		let refs: Vec<&HyperVector> = positioned.iter().collect();
		self.bundle(&refs)
	}

	/// Cleanup memory: the `k` labels whose vectors are closest to `probe`.
	///
	/// Ordered by descending similarity, ties broken by label.
	#[must_use]
	pub fn nearest<'a, I>(&self, probe: &HyperVector, labels: I, k: usize) -> Vec<(String, f64)>
	where
		I: IntoIterator<Item = &'a str>,
	{
		let mut scored: Vec<(String, f64)> = labels
			.into_iter()
			.map(|label| (label.to_owned(), probe.similarity(&self.encode(label))))
			.collect();

		scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
		scored.dedup_by(|a, b| a.0 == b.0);
		scored.truncate(k);
		scored
	}
}
