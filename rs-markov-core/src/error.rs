use crate::model::version::FormatVersion;

/// Errors raised by the Markov core and its storage helpers.
///
/// Recoverable conditions (unknown context during untraining, sampling an
/// empty node) are not errors: they are reported through return values.
#[derive(Debug, thiserror::Error)]
pub enum MarkovError {
	/// Training input was not valid UTF-8 text.
	#[error("training expects text input: {0}")]
	NotText(#[from] std::str::Utf8Error),

	/// A snapshot was written by a newer format than this build understands.
	#[error("snapshot format {found} is newer than the supported format {supported}")]
	UnsupportedVersion {
		/// Version recorded in the snapshot.
		found: FormatVersion,
		/// Latest version known to the upgrade chain.
		supported: FormatVersion,
	},

	/// The snapshot's declared order disagrees with its graph.
	#[error("snapshot order {declared} does not match graph order {graph}")]
	OrderMismatch {
		declared: usize,
		graph: usize,
	},

	/// Tokenization strategy name could not be parsed.
	#[error("unknown tokenization strategy '{0}' (expected 'character' or 'word')")]
	UnknownStrategy(String),

	/// A model name cannot be mapped to a storage key.
	#[error("invalid model name '{0}'")]
	InvalidName(String),

	/// Snapshot bytes could not be encoded or decoded.
	#[error("snapshot encoding error: {0}")]
	Snapshot(#[from] postcard::Error),

	/// Underlying storage failure.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, MarkovError>;
