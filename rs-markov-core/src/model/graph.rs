use std::borrow::Borrow;
use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;
use std::iter::FusedIterator;

use log::warn;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::node::WeightedNode;

/// Fixed-length window of tokens used as a lookup key.
///
/// A context is immutable once built; advancing the window produces a new
/// key through [`Context::shifted`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Context<T>(Box<[T]>);

impl<T> Context<T> {
	/// Tokens of the window, oldest first.
	pub fn tokens(&self) -> &[T] {
		&self.0
	}

	/// Returns the window advanced by one token: the oldest token is dropped
	/// and `next` is appended.
	pub fn shifted(&self, next: T) -> Self
	where
		T: Clone,
	{
		let tokens = self.0.iter().skip(1).cloned().chain(std::iter::once(next)).collect();
		Self(tokens)
	}
}

impl<T> From<Vec<T>> for Context<T> {
	fn from(tokens: Vec<T>) -> Self {
		Self(tokens.into_boxed_slice())
	}
}

impl<T> Borrow<[T]> for Context<T> {
	fn borrow(&self) -> &[T] {
		&self.0
	}
}

/// Storage layout, chosen once from the order at construction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
enum Layout<T: Eq + Hash> {
	/// Order 0: the root holds raw token frequencies.
	Flat(WeightedNode<T>),
	/// Order k > 0: the root counts context keys, and each key owns the node
	/// of tokens observed right after it.
	Windowed {
		root: WeightedNode<Context<T>>,
		contexts: HashMap<Context<T>, WeightedNode<T>>,
	},
}

/// Result of an untraining pass.
///
/// Misses are recoverable: they are logged and the pass carries on with the
/// remaining tokens. Decrements applied before a miss are kept.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UntrainOutcome {
	/// Observations successfully removed.
	pub removed: usize,
	/// Windows (or tokens, at order 0) that had no matching observation.
	pub missing: usize,
}

impl UntrainOutcome {
	/// `true` when every observation was found and removed.
	pub fn is_complete(&self) -> bool {
		self.missing == 0
	}
}

/// Order-k Markov chain over arbitrary tokens.
///
/// # Responsibilities
/// - Turn a token sequence into overlapping `k`-token windows, each mapped to
///   the token that follows it
/// - Remove exactly what a previous training pass on the same tokens added
/// - Produce lazy token sequences by weighted random walks
///
/// # Invariants
/// - `order` never changes after construction
/// - For every key in `contexts`, the root weight of that key equals the
///   total of its node, so both are created and destroyed together
/// - No node stored in `contexts` is empty
///
/// # Notes
/// - A graph is not synchronized. Callers sharing one across threads must
///   serialize every access (for example behind a single `Mutex`). The
///   iterator returned by [`ContextGraph::generate`] borrows the graph, so it
///   cannot be mutated while a generation is in flight.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ContextGraph<T: Eq + Hash> {
	/// Number of tokens in a context key.
	order: usize,
	layout: Layout<T>,
}

/// Bounded FIFO of the last `k` tokens seen during a training walk.
struct Window<T> {
	capacity: usize,
	tokens: VecDeque<T>,
}

impl<T: Clone> Window<T> {
	fn new(capacity: usize) -> Self {
		Self { capacity, tokens: VecDeque::with_capacity(capacity) }
	}

	/// The current key, once the window is full.
	fn key(&self) -> Option<Context<T>> {
		if self.tokens.len() < self.capacity {
			return None;
		}
		Some(Context::from(self.tokens.iter().cloned().collect::<Vec<_>>()))
	}

	fn push(&mut self, token: T) {
		if self.tokens.len() == self.capacity {
			self.tokens.pop_front();
		}
		self.tokens.push_back(token);
	}
}

impl<T: Eq + Hash> ContextGraph<T> {
	/// Creates an empty graph of the given order.
	///
	/// Order 0 builds a flat frequency model without history.
	pub fn new(order: usize) -> Self {
		let layout = if order == 0 {
			Layout::Flat(WeightedNode::new())
		} else {
			Layout::Windowed { root: WeightedNode::new(), contexts: HashMap::new() }
		};
		Self { order, layout }
	}

	pub fn order(&self) -> usize {
		self.order
	}

	/// Total weight of the root.
	///
	/// At order 0 this is the number of trained tokens, otherwise the number
	/// of trained windows. Zero means the graph holds no data.
	pub fn count(&self) -> usize {
		match &self.layout {
			Layout::Flat(root) => root.total(),
			Layout::Windowed { root, .. } => root.total(),
		}
	}

	/// Number of distinct context keys (always 0 at order 0).
	pub fn context_count(&self) -> usize {
		match &self.layout {
			Layout::Flat(_) => 0,
			Layout::Windowed { contexts, .. } => contexts.len(),
		}
	}

	/// Node of tokens observed after `key`, if the key is known.
	pub fn context(&self, key: &[T]) -> Option<&WeightedNode<T>> {
		match &self.layout {
			Layout::Flat(_) => None,
			Layout::Windowed { contexts, .. } => contexts.get(key),
		}
	}

	/// Iterates over every stored context and its node.
	pub fn contexts(&self) -> Box<dyn Iterator<Item = (&[T], &WeightedNode<T>)> + '_> {
		match &self.layout {
			Layout::Flat(_) => Box::new(std::iter::empty()),
			Layout::Windowed { contexts, .. } => {
				Box::new(contexts.iter().map(|(key, node)| (key.tokens(), node)))
			}
		}
	}

	/// Weight recorded at the root for `key`.
	///
	/// At order 0 the root is keyed by single tokens, so `key` must hold
	/// exactly one token.
	pub fn root_weight(&self, key: &[T]) -> usize {
		match &self.layout {
			Layout::Flat(root) => match key {
				[token] => root.weight(token),
				_ => 0,
			},
			Layout::Windowed { root, .. } => root.weight(key),
		}
	}

	/// Starts a lazy random walk over the graph.
	///
	/// See [`Generate`] for the exact sequence produced.
	pub fn generate<R: Rng>(&self, rng: R) -> Generate<'_, T, R> {
		Generate { graph: self, rng, step: Step::Start }
	}
}

impl<T: Eq + Hash + Clone> ContextGraph<T> {
	/// Adds a token sequence to the graph.
	///
	/// - Order 0: every token increments the root.
	/// - Order k: every window of `k` consecutive tokens becomes a context
	///   key mapped to the token immediately following it, and the root
	///   counts the key once.
	///
	/// Sequences shorter than `k + 1` tokens add nothing at order k.
	pub fn train<I>(&mut self, tokens: I)
	where
		I: IntoIterator<Item = T>,
	{
		match &mut self.layout {
			Layout::Flat(root) => {
				for token in tokens {
					root.increment(token);
				}
			}
			Layout::Windowed { root, contexts } => {
				let mut window = Window::new(self.order);
				for token in tokens {
					if let Some(key) = window.key() {
						contexts.entry(key.clone()).or_default().increment(token.clone());
						root.increment(key);
					}
					window.push(token);
				}
			}
		}
	}
}

impl<T: Eq + Hash + Clone + Debug> ContextGraph<T> {
	/// Removes a token sequence previously added with [`ContextGraph::train`].
	///
	/// Walks the same windows as training. Each window whose key or token is
	/// unknown is logged and counted in the outcome, then skipped; the rest of
	/// the sequence is still processed and nothing already removed is restored.
	///
	/// Untraining the exact sequence that was trained restores the graph to its
	/// previous content.
	pub fn untrain<I>(&mut self, tokens: I) -> UntrainOutcome
	where
		I: IntoIterator<Item = T>,
	{
		let mut outcome = UntrainOutcome::default();

		match &mut self.layout {
			Layout::Flat(root) => {
				for token in tokens {
					if root.decrement(&token) {
						outcome.removed += 1;
					} else {
						warn!("token {token:?} not found");
						outcome.missing += 1;
					}
				}
			}
			Layout::Windowed { root, contexts } => {
				let mut window = Window::new(self.order);
				for token in tokens {
					if let Some(key) = window.key() {
						match contexts.get_mut(&key) {
							Some(node) => {
								if node.decrement(&token) {
									if node.is_empty() {
										contexts.remove(&key);
									}
									root.decrement(&key);
									outcome.removed += 1;
								} else {
									warn!("token {token:?} not found after key {:?}", key.tokens());
									outcome.missing += 1;
								}
							}
							None => {
								warn!("key {:?} not found", key.tokens());
								outcome.missing += 1;
							}
						}
					}
					window.push(token);
				}
			}
		}

		outcome
	}
}

/// Where a [`Generate`] walk currently stands.
enum Step<'a, T> {
	Start,
	/// Replaying the tokens of the starting key.
	Opening { key: &'a Context<T>, index: usize },
	/// Sampling successors of the rolling window.
	Walking(Context<T>),
	Done,
}

/// Lazy token sequence produced by [`ContextGraph::generate`].
///
/// - Order 0: yields at most one token, sampled from the root frequencies.
/// - Order k: samples a starting key from the root (weighted by how often
///   each key was trained), yields its `k` tokens, then repeatedly samples the
///   successor of the last `k` tokens. The walk ends the first time the
///   window is unknown or its node yields nothing.
///
/// The sequence is not restartable, and it is unbounded when the trained
/// contexts form a cycle (`ABAB` at order 1 alternates forever). Consumers
/// must cap it, e.g. with [`Iterator::take`] as
/// [`MarkovModel::generate_text`](crate::MarkovModel::generate_text) does.
/// Dropping it early has no side effects.
pub struct Generate<'a, T: Eq + Hash, R> {
	graph: &'a ContextGraph<T>,
	rng: R,
	step: Step<'a, T>,
}

impl<'a, T: Eq + Hash, R> Generate<'a, T, R> {
	/// A walk that yields nothing.
	pub(crate) fn finished(graph: &'a ContextGraph<T>, rng: R) -> Self {
		Self { graph, rng, step: Step::Done }
	}
}

impl<'a, T: Eq + Hash + Clone, R: Rng> Iterator for Generate<'a, T, R> {
	type Item = &'a T;

	fn next(&mut self) -> Option<&'a T> {
		let graph = self.graph;
		loop {
			match std::mem::replace(&mut self.step, Step::Done) {
				Step::Start => match &graph.layout {
					Layout::Flat(root) => return root.pick_weighted(&mut self.rng),
					Layout::Windowed { root, .. } => {
						let key = root.pick_weighted(&mut self.rng)?;
						self.step = Step::Opening { key, index: 0 };
					}
				},
				Step::Opening { key, index } => match key.tokens().get(index) {
					Some(token) => {
						self.step = Step::Opening { key, index: index + 1 };
						return Some(token);
					}
					None => self.step = Step::Walking(key.clone()),
				},
				Step::Walking(window) => {
					let Layout::Windowed { contexts, .. } = &graph.layout else {
						return None;
					};
					let next = contexts.get(&window)?.pick_weighted(&mut self.rng)?;
					self.step = Step::Walking(window.shifted(next.clone()));
					return Some(next);
				}
				Step::Done => return None,
			}
		}
	}
}

impl<'a, T: Eq + Hash + Clone, R: Rng> FusedIterator for Generate<'a, T, R> {}
