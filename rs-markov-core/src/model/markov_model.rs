use rand::Rng;
use rand::rngs::ThreadRng;

use crate::error::Result;
use super::graph::{ContextGraph, Generate, UntrainOutcome};
use super::snapshot::Snapshot;
use super::strategy::{Strategy, TokenizationStrategy};
use super::version::FormatVersion;

/// Order used for new models when none is configured.
pub const DEFAULT_ORDER: usize = 5;

/// A Markov chain text model.
///
/// Couples a [`ContextGraph`] with the tokenization strategy used to feed it
/// and tracks whether it holds any training data.
///
/// # Responsibilities
/// - Tokenize text and train or untrain the graph with it
/// - Generate token sequences once trained
/// - Convert to and from snapshot bytes, upgrading old snapshots on load
///
/// # Invariants
/// - `order` and `strategy` never change after construction
/// - `trained == graph.count() > 0` after every train or untrain call
///
/// # Notes
/// - A model is not synchronized. Concurrent train, untrain or generate calls
///   on one instance must be serialized by the caller, typically with a
///   single `Mutex` around the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkovModel {
	strategy: Strategy,
	graph: ContextGraph<String>,
	trained: bool,
	version: FormatVersion,
}

impl MarkovModel {
	/// Creates an untrained model of the given order.
	pub fn new(order: usize, strategy: Strategy) -> Self {
		Self::from_parts(strategy, ContextGraph::new(order), false)
	}

	pub(crate) fn from_parts(strategy: Strategy, graph: ContextGraph<String>, trained: bool) -> Self {
		Self { strategy, graph, trained, version: FormatVersion::CURRENT }
	}

	pub fn order(&self) -> usize {
		self.graph.order()
	}

	pub fn strategy(&self) -> Strategy {
		self.strategy
	}

	/// `true` once the graph holds at least one observation.
	pub fn is_trained(&self) -> bool {
		self.trained
	}

	/// Format version of the model's persisted shape.
	pub fn version(&self) -> FormatVersion {
		self.version
	}

	/// Read-only access to the underlying graph.
	pub fn graph(&self) -> &ContextGraph<String> {
		&self.graph
	}

	/// Tokenizes `text` and adds it to the model.
	pub fn train(&mut self, text: &str) {
		self.graph.train(self.strategy.tokenize(text));
		self.trained = self.graph.count() > 0;
	}

	/// Tokenizes `text` and removes it from the model.
	///
	/// Observations that cannot be found are logged and counted in the
	/// outcome; the rest of the text is still removed.
	pub fn untrain(&mut self, text: &str) -> UntrainOutcome {
		let outcome = self.graph.untrain(self.strategy.tokenize(text));
		self.trained = self.graph.count() > 0;
		outcome
	}

	/// Trains on raw bytes.
	///
	/// # Errors
	/// Returns [`crate::error::MarkovError::NotText`] if `bytes` is not UTF-8.
	/// The model is left untouched in that case.
	pub fn train_bytes(&mut self, bytes: &[u8]) -> Result<()> {
		let text = std::str::from_utf8(bytes)?;
		self.train(text);
		Ok(())
	}

	/// Untrains on raw bytes.
	///
	/// # Errors
	/// Returns [`crate::error::MarkovError::NotText`] if `bytes` is not UTF-8.
	pub fn untrain_bytes(&mut self, bytes: &[u8]) -> Result<UntrainOutcome> {
		let text = std::str::from_utf8(bytes)?;
		Ok(self.untrain(text))
	}

	/// Generates a token sequence using the thread-local generator.
	pub fn generate(&self) -> Generate<'_, String, ThreadRng> {
		self.generate_with(rand::rng())
	}

	/// Generates a token sequence using `rng`.
	///
	/// An untrained model yields nothing without consulting the graph.
	pub fn generate_with<R: Rng>(&self, rng: R) -> Generate<'_, String, R> {
		if !self.trained {
			return Generate::finished(&self.graph, rng);
		}
		self.graph.generate(rng)
	}

	/// Generates up to `max_tokens` tokens and joins them with the model's
	/// strategy.
	pub fn generate_text(&self, max_tokens: usize) -> String {
		self.strategy.join(self.generate().take(max_tokens))
	}

	/// Encodes the model as snapshot bytes at the current format version.
	pub fn to_bytes(&self) -> Result<Vec<u8>> {
		Snapshot::from(self).to_bytes()
	}

	/// Decodes snapshot bytes, upgrading older formats.
	///
	/// # Errors
	/// - [`crate::error::MarkovError::Snapshot`] if the bytes cannot be decoded
	/// - [`crate::error::MarkovError::UnsupportedVersion`] if the snapshot is
	///   newer than this build
	pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
		Snapshot::from_bytes(bytes)?.try_into()
	}
}
