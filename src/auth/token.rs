//! Shared access-token bookkeeping composed into every authorizer variant.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{Authenticator, ScopeSet},
	config::ACCESS_TOKEN_PATH,
	error::{OAuthError, ResponseError},
};

/// Margin subtracted from `expires_in` to absorb clock skew and in-flight
/// latency, so a locally-valid token is never already dead on arrival.
const EXPIRY_SAFETY_MARGIN: Duration = Duration::seconds(10);

#[derive(Debug, Deserialize)]
struct TokenPayload {
	access_token: String,
	expires_in: i64,
	scope: String,
	refresh_token: Option<String>,
}

/// Mutable token state owned by exactly one authorizer.
///
/// Created empty, replaced wholesale by each successful token-endpoint
/// exchange, and cleared on revocation or on a 401. The state is local
/// bookkeeping only; [`is_valid`](Self::is_valid) makes no claim about
/// server-side validity.
#[derive(Debug, Default)]
pub struct TokenState {
	access_token: Option<String>,
	refresh_token: Option<String>,
	scopes: ScopeSet,
	expires_at: Option<OffsetDateTime>,
}
impl TokenState {
	/// Creates empty (unauthorized) state.
	pub fn new() -> Self {
		Self::default()
	}

	/// The held access token, if any.
	pub fn access_token(&self) -> Option<&str> {
		self.access_token.as_deref()
	}

	/// The held refresh token, if any.
	pub fn refresh_token(&self) -> Option<&str> {
		self.refresh_token.as_deref()
	}

	/// Replaces the held refresh token.
	pub fn set_refresh_token(&mut self, refresh_token: Option<String>) {
		self.refresh_token = refresh_token;
	}

	/// Scopes granted to the held access token.
	pub fn scopes(&self) -> &ScopeSet {
		&self.scopes
	}

	/// Expiry instant of the held access token, if any.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		self.expires_at
	}

	/// Whether the held token is ready to authorize requests right now.
	pub fn is_valid(&self) -> bool {
		self.is_valid_at(OffsetDateTime::now_utc())
	}

	/// Pure variant of [`is_valid`](Self::is_valid) against an explicit
	/// instant: a token is valid iff one is held and `now` precedes its
	/// expiry.
	pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
		self.access_token.is_some() && self.expires_at.is_some_and(|expires_at| now < expires_at)
	}

	/// Drops the access token, its scopes, and its expiry. The refresh token,
	/// when held, survives so the state can be re-authorized.
	pub fn clear(&mut self) {
		self.access_token = None;
		self.scopes.clear();
		self.expires_at = None;
	}

	/// Exchanges `grant_params` at the token endpoint and replaces the held
	/// token on success.
	///
	/// A payload carrying an `error` key fails with [`OAuthError`] before any
	/// further parsing. The new expiry is computed from the instant *before*
	/// the request started, minus a safety margin.
	pub(crate) async fn exchange(
		&mut self,
		authenticator: &Authenticator,
		grant_params: Vec<(String, String)>,
	) -> Result<()> {
		let pre_request = OffsetDateTime::now_utc();
		let response = authenticator.post(ACCESS_TOKEN_PATH, grant_params).await?;
		let payload: Value = match response.json() {
			Ok(payload) => payload,
			Err(_) => return Err(ResponseError::BadJson(Box::new(response)).into()),
		};

		if let Some(error) = payload.get("error") {
			let error = match error {
				Value::String(text) => text.clone(),
				other => other.to_string(),
			};
			let description = payload
				.get("error_description")
				.and_then(Value::as_str)
				.map(str::to_owned);

			return Err(OAuthError { error, description, response: Box::new(response) }.into());
		}

		let parsed: TokenPayload = match serde_path_to_error::deserialize(payload) {
			Ok(parsed) => parsed,
			Err(source) => {
				tracing::debug!(path = %source.path(), "malformed token payload");

				return Err(ResponseError::BadJson(Box::new(response)).into());
			},
		};

		self.expires_at =
			Some(pre_request + Duration::seconds(parsed.expires_in) - EXPIRY_SAFETY_MARGIN);
		self.access_token = Some(parsed.access_token);
		self.scopes = ScopeSet::new(parsed.scope.split_whitespace());

		if let Some(refresh_token) = parsed.refresh_token {
			self.refresh_token = Some(refresh_token);
		}

		Ok(())
	}

	/// Installs a token obtained out-of-band (implicit grant callback).
	/// The expiry is relative to now; callers account for callback latency.
	pub(crate) fn install(&mut self, access_token: String, expires_in: i64, scope: &str) {
		self.expires_at = Some(OffsetDateTime::now_utc() + Duration::seconds(expires_in));
		self.access_token = Some(access_token);
		self.scopes = ScopeSet::new(scope.split_whitespace());
	}

	/// Revokes the held access token at the server, then clears local state.
	pub(crate) async fn revoke_access(&mut self, authenticator: &Authenticator) -> Result<()> {
		let Some(token) = self.access_token.clone() else {
			return Err(Error::invalid_invocation("no token available to revoke"));
		};

		authenticator.revoke_token(&token, Some("access_token")).await?;
		self.clear();

		Ok(())
	}
}
