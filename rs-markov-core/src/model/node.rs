use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use rand::Rng;

use serde::{Deserialize, Serialize};


/// Weighted multiset of outgoing edges for a single context.
///
/// A `WeightedNode` maps each observed key to the number of times it was
/// observed, and caches the sum of those counts so that sampling does not
/// need to rescan the map.
///
/// Conceptually, this is a node in a Markov chain where outgoing edges
/// are weighted by their number of observations.
///
/// ## Responsibilities:
/// - Accumulate occurrences during training
/// - Remove occurrences during untraining, dropping edges that reach zero
/// - Pick a key using weighted random sampling
///
/// ## Invariants
/// - `total == weights.values().sum()`
/// - Every stored weight is strictly positive
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct WeightedNode<K: Eq + Hash> {
	/// Outgoing edges indexed by key.
	/// Example: { 'e' => 42, 'a' => 3 }
	weights: HashMap<K, usize>,
	/// Cached sum of all weights.
	total: usize,
}

impl<K: Eq + Hash> Default for WeightedNode<K> {
	fn default() -> Self {
		Self::new()
	}
}

impl<K: Eq + Hash> WeightedNode<K> {
	/// Creates a new empty node.
	pub fn new() -> Self {
		Self {
			weights: HashMap::new(),
			total: 0,
		}
	}

	/// Records one occurrence of `key`.
	///
	/// - If the edge already exists, its weight is increased.
	/// - Otherwise, a new edge is created with a weight of 1.
	pub fn increment(&mut self, key: K) {
		*self.weights.entry(key).or_insert(0) += 1;
		self.total += 1;
	}

	/// Removes one occurrence of `key`.
	///
	/// The edge is deleted once its weight reaches zero.
	///
	/// Returns `false` without touching the node if `key` was never recorded.
	pub fn decrement<Q>(&mut self, key: &Q) -> bool
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		let Some(weight) = self.weights.get_mut(key) else {
			return false;
		};

		*weight -= 1;
		self.total -= 1;
		if *weight == 0 {
			self.weights.remove(key);
		}
		true
	}

	/// Picks a key using weighted random sampling.
	///
	/// The probability of selecting a key is proportional to its weight.
	///
	/// This method performs:
	/// - a uniform draw in `[1, total]`
	/// - an O(n) cumulative subtraction over the edges
	///
	/// Returns `None` if the node is empty.
	pub fn pick_weighted<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&K> {
		if self.total == 0 {
			return None;
		}

		let mut draw = rng.random_range(1..=self.total);
		for (key, weight) in &self.weights {
			if draw <= *weight {
				return Some(key);
			}
			draw -= weight;
		}

		// Unreachable while `total` matches the stored weights.
		None
	}

	/// Returns the weight recorded for `key`, or 0 if absent.
	pub fn weight<Q>(&self, key: &Q) -> usize
	where
		K: Borrow<Q>,
		Q: Hash + Eq + ?Sized,
	{
		self.weights.get(key).copied().unwrap_or(0)
	}

	/// Sum of all weights.
	pub fn total(&self) -> usize {
		self.total
	}

	/// Number of distinct keys.
	pub fn len(&self) -> usize {
		self.weights.len()
	}

	pub fn is_empty(&self) -> bool {
		self.total == 0
	}

	/// Iterates over `(key, weight)` pairs in arbitrary order.
	pub fn iter(&self) -> impl Iterator<Item = (&K, usize)> {
		self.weights.iter().map(|(key, weight)| (key, *weight))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::SeedableRng;
	use rand::rngs::StdRng;
	use rstest::rstest;

	fn assert_consistent<K: Eq + Hash>(node: &WeightedNode<K>) {
		let sum: usize = node.iter().map(|(_, weight)| weight).sum();
		assert_eq!(node.total(), sum);
		assert!(node.iter().all(|(_, weight)| weight > 0));
	}

	#[test]
	fn increment_tracks_total() {
		let mut node = WeightedNode::new();
		node.increment('a');
		node.increment('a');
		node.increment('b');

		assert_eq!(node.weight(&'a'), 2);
		assert_eq!(node.weight(&'b'), 1);
		assert_eq!(node.total(), 3);
		assert_consistent(&node);
	}

	#[test]
	fn decrement_removes_edge_at_zero() {
		let mut node = WeightedNode::new();
		node.increment("x".to_owned());
		node.increment("x".to_owned());

		assert!(node.decrement("x"));
		assert_eq!(node.weight("x"), 1);
		assert!(node.decrement("x"));
		assert_eq!(node.len(), 0);
		assert!(node.is_empty());
		assert_consistent(&node);
	}

	#[test]
	fn decrement_unknown_key_is_a_noop() {
		let mut node = WeightedNode::new();
		node.increment(1u32);

		assert!(!node.decrement(&2));
		assert_eq!(node.total(), 1);
		assert_consistent(&node);
	}

	#[test]
	fn empty_node_never_picks() {
		let node: WeightedNode<char> = WeightedNode::new();
		let mut rng = StdRng::seed_from_u64(7);
		for _ in 0..100 {
			assert_eq!(node.pick_weighted(&mut rng), None);
		}
	}

	#[test]
	fn drained_node_never_picks() {
		let mut node = WeightedNode::new();
		node.increment('z');
		node.decrement(&'z');
		let mut rng = StdRng::seed_from_u64(7);
		assert_eq!(node.pick_weighted(&mut rng), None);
	}

	#[test]
	fn weighted_pick_converges_to_ratio() {
		let mut node = WeightedNode::new();
		for _ in 0..3 {
			node.increment('a');
		}
		node.increment('b');

		let mut rng = StdRng::seed_from_u64(42);
		let draws = 40_000;
		let hits = (0..draws)
			.filter(|_| node.pick_weighted(&mut rng) == Some(&'a'))
			.count();

		// Expected 0.75, standard deviation ~0.002 at this sample size.
		let ratio = hits as f64 / draws as f64;
		assert!((ratio - 0.75).abs() < 0.015, "ratio was {ratio}");
	}

	#[rstest]
	#[case(&["a"])]
	#[case(&["a", "b", "a", "c"])]
	#[case(&["q", "q", "q", "q", "q"])]
	fn single_survivor_is_always_picked(#[case] extra: &[&str]) {
		let mut node = WeightedNode::new();
		for key in extra {
			node.increment(key.to_string());
		}
		node.increment("last".to_owned());
		for key in extra {
			node.decrement(*key);
		}

		let mut rng = StdRng::seed_from_u64(1);
		for _ in 0..50 {
			assert_eq!(node.pick_weighted(&mut rng).map(String::as_str), Some("last"));
		}
		assert_consistent(&node);
	}
}
