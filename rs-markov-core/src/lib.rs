//! Markov chain text generation library.
//!
//! This crate provides an order-k Markov chain engine including:
//! - Weighted, incrementally mutable context graphs
//! - Exact-inverse training and untraining
//! - Lazy generation by weighted random walks, capped by the caller
//! - Character and word tokenization
//! - Versioned snapshots with a forward upgrade chain
//! - A folder-backed snapshot store keyed by model name
//! - A dated record of trained lines that retires old ones
//!
//! The core is single-threaded and performs no I/O; only [`store`] and
//! [`io`] touch the filesystem.

/// Error type shared by the whole crate.
pub mod error;

/// Markov graph, model, tokenization and snapshot logic.
pub mod model;

/// File helpers (line reading, folder listing, path handling).
pub mod io;

/// Dated record of trained lines with age-based retirement.
pub mod record;

/// Named snapshot persistence.
pub mod store;

pub use error::{MarkovError, Result};
pub use model::graph::{ContextGraph, Generate, UntrainOutcome};
pub use model::markov_model::{DEFAULT_ORDER, MarkovModel};
pub use model::strategy::{Strategy, TokenizationStrategy};
pub use model::version::FormatVersion;
pub use record::{TrainedLines, UpdateOutcome, current_day};
pub use store::{FolderStore, SnapshotStore};
