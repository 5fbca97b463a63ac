//! Normalized OAuth2 scope sets.

// std
use std::collections::BTreeSet;
// self
use crate::_prelude::*;

/// Deduplicated, ordered set of OAuth2 scope names.
///
/// Scopes are normalized on construction (surrounding whitespace trimmed,
/// empty entries dropped) so equality and the space-delimited wire rendering
/// stay stable regardless of input order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScopeSet {
	scopes: BTreeSet<String>,
}
impl ScopeSet {
	/// Creates a normalized scope set from any iterator of scope names.
	pub fn new<I, S>(scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let scopes = scopes
			.into_iter()
			.map(|scope| scope.into().trim().to_owned())
			.filter(|scope| !scope.is_empty())
			.collect();

		Self { scopes }
	}

	/// Number of distinct scopes.
	pub fn len(&self) -> usize {
		self.scopes.len()
	}

	/// Returns `true` when no scopes are present.
	pub fn is_empty(&self) -> bool {
		self.scopes.is_empty()
	}

	/// Returns `true` when the set contains the given scope.
	pub fn contains(&self, scope: &str) -> bool {
		self.scopes.contains(scope)
	}

	/// Iterator over the normalized scope names.
	pub fn iter(&self) -> impl Iterator<Item = &str> {
		self.scopes.iter().map(String::as_str)
	}

	/// Space-delimited wire rendering, as sent to and received from the
	/// authorization and token endpoints.
	pub fn normalized(&self) -> String {
		self.scopes.iter().cloned().collect::<Vec<_>>().join(" ")
	}

	/// Drops every scope.
	pub(crate) fn clear(&mut self) {
		self.scopes.clear();
	}
}
impl Display for ScopeSet {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.normalized())
	}
}
impl FromStr for ScopeSet {
	type Err = std::convert::Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self::new(s.split_whitespace()))
	}
}
