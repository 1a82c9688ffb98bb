//! Strongly typed portal identifiers enforced across the broker domain.

// std
use std::num::NonZeroU64;
// self
use crate::_prelude::*;

/// Error returned when account identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// Portal identifiers start at one.
	#[error("Account identifier cannot be zero.")]
	Zero,
	/// The identifier was not a base-10 unsigned integer.
	#[error("Account identifier `{value}` is not numeric.")]
	NotNumeric {
		/// Raw input that failed to parse.
		value: String,
	},
}

/// Numeric identifier of one installed HubSpot portal (`hub_id`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct AccountId(NonZeroU64);
impl AccountId {
	/// Creates a new identifier after validation.
	pub fn new(value: u64) -> Result<Self, IdentifierError> {
		NonZeroU64::new(value).map(Self).ok_or(IdentifierError::Zero)
	}

	/// Returns the raw numeric value.
	pub fn get(self) -> u64 {
		self.0.get()
	}
}
impl From<AccountId> for u64 {
	fn from(value: AccountId) -> Self {
		value.get()
	}
}
impl TryFrom<u64> for AccountId {
	type Error = IdentifierError;

	fn try_from(value: u64) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl Debug for AccountId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Account({})", self.0)
	}
}
impl Display for AccountId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		Display::fmt(&self.0, f)
	}
}
impl FromStr for AccountId {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let value = s
			.trim()
			.parse::<u64>()
			.map_err(|_| IdentifierError::NotNumeric { value: s.to_owned() })?;

		Self::new(value)
	}
}
