use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::markov_model::MarkovModel;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Days elapsed since the Unix epoch, in UTC.
pub fn current_day() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|elapsed| elapsed.as_secs() / SECONDS_PER_DAY)
		.unwrap_or(0)
}

/// Counts of one [`TrainedLines::update`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
	/// New lines trained into the model.
	pub trained: usize,
	/// Lines skipped because the record already held them.
	pub skipped: usize,
	/// Expired lines untrained from the model and dropped from the record.
	pub retired: usize,
}

/// Dated record of every line a model was trained on.
///
/// # Responsibilities
/// - Refuse lines the model already learned, across runs
/// - Remember the day each line was added
/// - Untrain lines once they are older than a retention window
///
/// # Invariants
/// - Each recorded line was trained into the model exactly once and has not
///   been untrained since
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct TrainedLines {
	/// Line → day it was added (see [`current_day`]).
	added: HashMap<String, u64>,
}

impl TrainedLines {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
		Ok(postcard::from_bytes(bytes)?)
	}

	pub fn to_bytes(&self) -> Result<Vec<u8>> {
		Ok(postcard::to_stdvec(self)?)
	}

	pub fn contains(&self, line: &str) -> bool {
		self.added.contains_key(line)
	}

	/// Day `line` was added, if recorded.
	pub fn added_on(&self, line: &str) -> Option<u64> {
		self.added.get(line).copied()
	}

	pub fn len(&self) -> usize {
		self.added.len()
	}

	pub fn is_empty(&self) -> bool {
		self.added.is_empty()
	}

	/// Drops `line` from the record after it was untrained by hand, so a later
	/// update may train it again. Returns `false` if it was not recorded.
	pub fn forget(&mut self, line: &str) -> bool {
		self.added.remove(line).is_some()
	}

	/// Trains `model` on every line not yet recorded, stamping it with `today`,
	/// then retires lines older than `window` days if a window is given.
	///
	/// A line is expired when `added + window < today`, so lines added today
	/// are never retired by the same pass.
	pub fn update<I, S>(&mut self, model: &mut MarkovModel, lines: I, window: Option<u64>, today: u64) -> UpdateOutcome
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut outcome = UpdateOutcome::default();

		for line in lines {
			let line = line.as_ref();
			if self.added.contains_key(line) {
				outcome.skipped += 1;
				continue;
			}
			model.train(line);
			self.added.insert(line.to_owned(), today);
			outcome.trained += 1;
		}

		if let Some(window) = window {
			outcome.retired = self.retire(model, window, today);
		}

		debug!(
			"trained {} lines, skipped {}, retired {}",
			outcome.trained, outcome.skipped, outcome.retired
		);
		outcome
	}

	/// Untrains and forgets every line added more than `window` days before
	/// `today`. Returns how many lines were retired.
	pub fn retire(&mut self, model: &mut MarkovModel, window: u64, today: u64) -> usize {
		let expired: Vec<String> = self
			.added
			.iter()
			.filter(|(_, day)| day.saturating_add(window) < today)
			.map(|(line, _)| line.clone())
			.collect();

		for line in &expired {
			model.untrain(line);
			self.added.remove(line);
		}

		if !expired.is_empty() {
			info!("retired {} lines older than {} days", expired.len(), window);
		}
		expired.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::strategy::Strategy;

	#[test]
	fn recorded_lines_are_skipped() {
		let mut model = MarkovModel::new(1, Strategy::Word);
		let mut record = TrainedLines::new();

		let first = record.update(&mut model, ["stocks rally today"], None, 100);
		let count = model.graph().count();
		let second = record.update(&mut model, ["stocks rally today", "bonds slip"], None, 101);

		assert_eq!(first, UpdateOutcome { trained: 1, skipped: 0, retired: 0 });
		assert_eq!(second, UpdateOutcome { trained: 1, skipped: 1, retired: 0 });
		assert_eq!(model.graph().count(), count + 1);
		assert_eq!(record.added_on("stocks rally today"), Some(100));
		assert_eq!(record.added_on("bonds slip"), Some(101));
	}

	#[test]
	fn expired_lines_are_untrained() {
		let mut model = MarkovModel::new(1, Strategy::Word);
		let mut record = TrainedLines::new();
		record.update(&mut model, ["old news story"], None, 10);
		let mut fresh_only = MarkovModel::new(1, Strategy::Word);
		fresh_only.train("fresh news story");

		let outcome = record.update(&mut model, ["fresh news story"], Some(3), 14);

		assert_eq!(outcome.retired, 1);
		assert!(!record.contains("old news story"));
		assert!(record.contains("fresh news story"));
		assert_eq!(model, fresh_only);
	}

	#[test]
	fn lines_inside_window_are_kept() {
		let mut model = MarkovModel::new(1, Strategy::Word);
		let mut record = TrainedLines::new();
		record.update(&mut model, ["recent story here"], None, 10);

		assert_eq!(record.retire(&mut model, 3, 13), 0);
		assert!(record.contains("recent story here"));
		assert!(model.is_trained());
	}

	#[test]
	fn retired_line_can_be_trained_again() {
		let mut model = MarkovModel::new(1, Strategy::Word);
		let mut record = TrainedLines::new();
		record.update(&mut model, ["returning story"], None, 1);
		record.retire(&mut model, 0, 5);
		assert!(!model.is_trained());

		let outcome = record.update(&mut model, ["returning story"], None, 5);
		assert_eq!(outcome.trained, 1);
		assert!(model.is_trained());
	}

	#[test]
	fn forgotten_line_is_trained_again() {
		let mut model = MarkovModel::new(1, Strategy::Word);
		let mut record = TrainedLines::new();
		record.update(&mut model, ["manual removal"], None, 3);
		model.untrain("manual removal");

		assert!(record.forget("manual removal"));
		assert!(!record.forget("manual removal"));
		assert_eq!(record.update(&mut model, ["manual removal"], None, 4).trained, 1);
		assert_eq!(model.graph().count(), 1);
	}

	#[test]
	fn record_bytes_round_trip() {
		let mut model = MarkovModel::new(2, Strategy::Character);
		let mut record = TrainedLines::new();
		record.update(&mut model, ["a line", "another line"], None, 42);

		assert_eq!(TrainedLines::from_bytes(&record.to_bytes().unwrap()).unwrap(), record);
	}
}
