use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MarkovError;

/// Splits text into the atomic tokens a model is trained on.
///
/// Implementations are pure: the same input always yields the same ordered
/// sequence, and no state is kept between calls.
pub trait TokenizationStrategy {
	fn tokenize(&self, text: &str) -> Vec<String>;
}

/// One token per Unicode scalar value.
#[derive(Clone, Copy, Debug, Default)]
pub struct Characters;

impl TokenizationStrategy for Characters {
	fn tokenize(&self, text: &str) -> Vec<String> {
		text.chars().map(String::from).collect()
	}
}

/// One token per whitespace-delimited word. Runs of whitespace are a single
/// separator and never produce empty tokens.
#[derive(Clone, Copy, Debug, Default)]
pub struct Words;

impl TokenizationStrategy for Words {
	fn tokenize(&self, text: &str) -> Vec<String> {
		text.split_whitespace().map(str::to_owned).collect()
	}
}

/// Tokenization strategy selected when a model is created.
///
/// This is the persisted form of the strategy: it is stored in snapshots and
/// never changes for the lifetime of a model.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Strategy {
	#[default]
	Character,
	Word,
}

impl Strategy {
	/// Joins generated tokens back into text.
	///
	/// Characters are concatenated; words are separated by a single space.
	pub fn join<I, S>(&self, tokens: I) -> String
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut text = String::new();
		for token in tokens {
			if *self == Strategy::Word && !text.is_empty() {
				text.push(' ');
			}
			text.push_str(token.as_ref());
		}
		text
	}
}

impl TokenizationStrategy for Strategy {
	fn tokenize(&self, text: &str) -> Vec<String> {
		match self {
			Strategy::Character => Characters.tokenize(text),
			Strategy::Word => Words.tokenize(text),
		}
	}
}

impl fmt::Display for Strategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Strategy::Character => f.write_str("character"),
			Strategy::Word => f.write_str("word"),
		}
	}
}

impl FromStr for Strategy {
	type Err = MarkovError;

	/// Accepts `character`/`char` and `word`, case-insensitively.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_lowercase().as_str() {
			"character" | "char" => Ok(Strategy::Character),
			"word" => Ok(Strategy::Word),
			_ => Err(MarkovError::UnknownStrategy(s.to_owned())),
		}
	}
}
