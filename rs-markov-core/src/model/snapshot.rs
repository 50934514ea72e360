use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{MarkovError, Result};
use super::graph::ContextGraph;
use super::markov_model::MarkovModel;
use super::strategy::Strategy;
use super::version::FormatVersion;

/// A single forward migration: rewrites a snapshot into the shape of the
/// version it is registered under.
type UpgradeStep = fn(&mut Snapshot);

/// Ordered upgrade chain.
///
/// Entries must stay sorted by version and are append-only: a new shape gets
/// a new entry at the end, and [`FormatVersion::CURRENT`] moves to it.
const UPGRADES: &[(FormatVersion, UpgradeStep)] = &[
	(FormatVersion::new(1, 0), drop_tokenization),
	(FormatVersion::new(1, 1), derive_trained),
];

/// 1.0: the tokenization name moved into `strategy`.
fn drop_tokenization(snapshot: &mut Snapshot) {
	snapshot.tokenization = None;
}

/// 1.1: `trained` is stored instead of being recomputed on load.
fn derive_trained(snapshot: &mut Snapshot) {
	snapshot.trained = Some(snapshot.graph.count() > 0);
}

/// Persisted form of a [`MarkovModel`].
///
/// The envelope keeps every field any past version wrote, so that old bytes
/// still decode. Obsolete fields are cleared, and missing ones filled, by
/// [`Snapshot::upgrade`].
///
/// Bytes are produced with `postcard` and are opaque to whatever store keeps
/// them.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
	/// `None` for snapshots written before versions were recorded.
	version: Option<FormatVersion>,
	order: usize,
	strategy: Strategy,
	/// Obsolete before 1.0.
	tokenization: Option<String>,
	/// Recorded since 1.1.
	trained: Option<bool>,
	graph: ContextGraph<String>,
}

impl Snapshot {
	/// Decodes a snapshot without upgrading it.
	pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
		Ok(postcard::from_bytes(bytes)?)
	}

	pub fn to_bytes(&self) -> Result<Vec<u8>> {
		Ok(postcard::to_stdvec(self)?)
	}

	/// Version recorded in the snapshot, [`FormatVersion::INITIAL`] if absent.
	pub fn version(&self) -> FormatVersion {
		self.version.unwrap_or(FormatVersion::INITIAL)
	}

	/// Walks the snapshot forward to [`FormatVersion::CURRENT`].
	///
	/// Every step newer than the recorded version runs once, in order, and
	/// bumps the recorded version. Upgrading a current snapshot does nothing.
	///
	/// # Errors
	/// Returns [`MarkovError::UnsupportedVersion`] if the snapshot is newer
	/// than this build.
	pub fn upgrade(&mut self) -> Result<()> {
		let found = self.version();
		if found > FormatVersion::CURRENT {
			return Err(MarkovError::UnsupportedVersion { found, supported: FormatVersion::CURRENT });
		}

		for (target, step) in UPGRADES {
			if self.version() < *target {
				debug!("upgrading snapshot {} -> {}", self.version(), target);
				step(self);
				self.version = Some(*target);
			}
		}

		Ok(())
	}
}

impl From<&MarkovModel> for Snapshot {
	fn from(model: &MarkovModel) -> Self {
		Self {
			version: Some(FormatVersion::CURRENT),
			order: model.order(),
			strategy: model.strategy(),
			tokenization: None,
			trained: Some(model.is_trained()),
			graph: model.graph().clone(),
		}
	}
}

impl TryFrom<Snapshot> for MarkovModel {
	type Error = MarkovError;

	/// Upgrades the snapshot and rebuilds the model from it.
	fn try_from(mut snapshot: Snapshot) -> Result<Self> {
		snapshot.upgrade()?;

		if snapshot.order != snapshot.graph.order() {
			return Err(MarkovError::OrderMismatch {
				declared: snapshot.order,
				graph: snapshot.graph.order(),
			});
		}

		let trained = snapshot.trained.unwrap_or_else(|| snapshot.graph.count() > 0);
		Ok(MarkovModel::from_parts(snapshot.strategy, snapshot.graph, trained))
	}
}
