use std::fmt;

use serde::{Deserialize, Serialize};

/// Version tag of the persisted model shape.
///
/// Versions are ordered lexicographically on `(major, minor)`. Snapshots
/// written before versions were recorded are treated as [`FormatVersion::INITIAL`].
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FormatVersion {
	major: u16,
	minor: u16,
}

impl FormatVersion {
	/// Shape of snapshots that carry no version at all.
	pub const INITIAL: Self = Self::new(0, 0);

	/// Shape written by this build.
	pub const CURRENT: Self = Self::new(1, 1);

	pub const fn new(major: u16, minor: u16) -> Self {
		Self { major, minor }
	}

	pub fn major(&self) -> u16 {
		self.major
	}

	pub fn minor(&self) -> u16 {
		self.minor
	}
}

impl fmt::Display for FormatVersion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}.{}", self.major, self.minor)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn orders_by_major_then_minor() {
		assert!(FormatVersion::INITIAL < FormatVersion::new(0, 9));
		assert!(FormatVersion::new(0, 9) < FormatVersion::new(1, 0));
		assert!(FormatVersion::new(1, 0) < FormatVersion::CURRENT);
		assert!(FormatVersion::CURRENT < FormatVersion::new(2, 0));
	}

	#[test]
	fn displays_as_decimal() {
		assert_eq!(FormatVersion::CURRENT.to_string(), "1.1");
	}
}
