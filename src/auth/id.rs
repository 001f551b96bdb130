//! Strongly typed provider identity shared by stores, locks, and coordinators.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("Provider identifier cannot be empty.")]
	Empty,
	/// The identifier contains whitespace characters.
	#[error("Provider identifier contains whitespace.")]
	ContainsWhitespace,
	/// The identifier exceeded the allowed character count.
	#[error("Provider identifier exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
}

/// Identifier for the provider credential a coordinator manages.
///
/// Doubles as the store key, so two deployments sharing one backend must use
/// distinct identifiers unless they really share one refresh credential.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderId(String);
impl ProviderId {
	/// Creates a new identifier after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}
}
impl Deref for ProviderId {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for ProviderId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl From<ProviderId> for String {
	fn from(value: ProviderId) -> Self {
		value.0
	}
}
impl TryFrom<String> for ProviderId {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view(&value)?;

		Ok(Self(value))
	}
}
impl Borrow<str> for ProviderId {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl Debug for ProviderId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Provider({})", self.0)
	}
}
impl Display for ProviderId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl FromStr for ProviderId {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

fn validate_view(view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty);
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace);
	}
	if view.len() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_reject_whitespace_and_empty_input() {
		assert!(ProviderId::new(" provider-123").is_err(), "Leading whitespace must be rejected.");
		assert!(ProviderId::new("provider-123 ").is_err(), "Trailing whitespace must be rejected.");
		assert!(ProviderId::new("").is_err());
		assert!(ProviderId::new("with space").is_err());

		let provider =
			ProviderId::new("provider-123").expect("Provider fixture should be considered valid.");

		assert_eq!(provider.as_ref(), "provider-123");
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let provider: ProviderId =
			serde_json::from_str("\"provider-42\"").expect("Provider should deserialize successfully.");

		assert_eq!(provider.as_ref(), "provider-42");
		assert!(serde_json::from_str::<ProviderId>("\"with space\"").is_err());
		assert!(serde_json::from_str::<ProviderId>("\" provider-42\"").is_err());
	}

	#[test]
	fn unicode_whitespace_and_length_limits() {
		let nbsp = format!("provider{}id", '\u{00A0}');

		assert!(ProviderId::new(&nbsp).is_err());

		let exact = "a".repeat(IDENTIFIER_MAX_LEN);

		ProviderId::new(&exact).expect("Exact length should succeed.");

		let too_long = "a".repeat(IDENTIFIER_MAX_LEN + 1);

		assert!(ProviderId::new(&too_long).is_err());
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<ProviderId, u8> = HashMap::from_iter([(
			ProviderId::new("provider-123").expect("Provider used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("provider-123"), Some(&7));
	}
}
