//! Top-level module for the Markov chain generation system.
//!
//! This module provides:
//! - Weighted edge multisets (`WeightedNode`)
//! - The order-k context graph and its lazy generator (`ContextGraph`)
//! - Tokenization strategies (`Strategy`)
//! - The owning model (`MarkovModel`)
//! - Versioned snapshots and their upgrade chain (`Snapshot`)

/// Order-k context graph with train, untrain and lazy generation.
pub mod graph;

/// Text model combining a graph with a tokenization strategy.
pub mod markov_model;

/// Weighted multiset of outgoing edges with weighted random sampling.
pub mod node;

/// Persisted model envelope and its forward upgrade chain.
pub mod snapshot;

/// Character and word tokenization.
pub mod strategy;

/// Format version tag of persisted models.
pub mod version;
