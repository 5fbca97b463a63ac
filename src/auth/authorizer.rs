//! The authorizer family: grant exchanges, refresh, and revocation composed
//! over the shared [`TokenState`] helper.
//!
//! Each variant owns zero-or-one live access token and knows how to obtain
//! one through its grant. Construction validates the authenticator kind the
//! grant requires; a mismatch is an invalid invocation. The lifecycle per
//! instance is Unauthorized → Authorized (exchange) → Expired (wall clock) →
//! Authorized (refresh, where supported) or → Unauthorized (revoke/clear).

// crates.io
use async_trait::async_trait;
// self
use crate::{
	_prelude::*,
	auth::{Authenticator, ScopeSet, TokenState},
};

/// Grant identifier used by installed clients without a user context.
const INSTALLED_CLIENT_GRANT: &str = "https://oauth.reddit.com/grants/installed_client";
/// Sentinel device identifier used when the caller supplies none.
const DEFAULT_DEVICE_ID: &str = "DO_NOT_TRACK_THIS_DEVICE";

/// Callback invoked immediately before and after a token refresh, receiving
/// the token state so external storage (e.g. persisted refresh tokens) can be
/// synchronized.
pub type RefreshHook = Box<dyn FnMut(&mut TokenState) + Send>;

/// Callback returning a one-time passcode consulted at refresh time.
pub type OtpHook = Box<dyn FnMut() -> Option<String> + Send>;

/// Common interface over every authorizer variant.
///
/// Default implementations compose the shared [`TokenState`]; variants only
/// override the operations their grant changes.
#[async_trait]
pub trait TokenAuthorizer: Send {
	/// The application identity this authorizer exchanges grants with.
	fn authenticator(&self) -> &Authenticator;

	/// Shared token bookkeeping.
	fn state(&self) -> &TokenState;

	/// Mutable access to the shared token bookkeeping.
	fn state_mut(&mut self) -> &mut TokenState;

	/// Whether the locally-held token is ready to authorize requests. This is
	/// local bookkeeping only and makes no claim about server-side validity.
	fn is_valid(&self) -> bool {
		self.state().is_valid()
	}

	/// The held bearer token, if any.
	fn access_token(&self) -> Option<&str> {
		self.state().access_token()
	}

	/// Scopes granted to the held access token.
	fn scopes(&self) -> &ScopeSet {
		self.state().scopes()
	}

	/// Whether this variant can mint a new access token without caller input.
	fn can_refresh(&self) -> bool {
		false
	}

	/// Obtains a fresh access token.
	async fn refresh(&mut self) -> Result<()> {
		Err(Error::invalid_invocation("this authorizer cannot refresh its token"))
	}

	/// Revokes the current authorization at the server and clears local
	/// state. Fails with an invalid-invocation error when nothing is held.
	async fn revoke(&mut self) -> Result<()> {
		let Some(token) = self.state().access_token().map(str::to_owned) else {
			return Err(Error::invalid_invocation("no token available to revoke"));
		};

		self.authenticator().revoke_token(&token, Some("access_token")).await?;
		self.state_mut().clear();

		Ok(())
	}

	/// Drops the held access token without contacting the server.
	fn clear(&mut self) {
		self.state_mut().clear();
	}
}

/// Code-grant authorizer, optionally carrying a rotating refresh token.
pub struct Authorizer {
	authenticator: Authenticator,
	state: TokenState,
	pre_refresh_hook: Option<RefreshHook>,
	post_refresh_hook: Option<RefreshHook>,
}
impl Authorizer {
	/// Creates an unauthorized code-grant authorizer. Either authenticator
	/// kind is accepted.
	pub fn new(authenticator: Authenticator) -> Self {
		Self { authenticator, state: TokenState::new(), pre_refresh_hook: None, post_refresh_hook: None }
	}

	/// Seeds a refresh token obtained out-of-band, enabling
	/// [`refresh`](TokenAuthorizer::refresh) before any code exchange.
	pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
		self.state.set_refresh_token(Some(refresh_token.into()));

		self
	}

	/// Registers a hook invoked immediately before each refresh.
	pub fn with_pre_refresh_hook(mut self, hook: RefreshHook) -> Self {
		self.pre_refresh_hook = Some(hook);

		self
	}

	/// Registers a hook invoked immediately after each successful refresh.
	pub fn with_post_refresh_hook(mut self, hook: RefreshHook) -> Self {
		self.post_refresh_hook = Some(hook);

		self
	}

	/// Exchanges the out-of-band authorization `code` for tokens. Requires a
	/// configured redirect URI.
	pub async fn authorize(&mut self, code: &str) -> Result<()> {
		let Some(redirect_uri) = self.authenticator.redirect_uri() else {
			return Err(Error::invalid_invocation("redirect URI not provided"));
		};
		let params = vec![
			("code".to_owned(), code.to_owned()),
			("grant_type".to_owned(), "authorization_code".to_owned()),
			("redirect_uri".to_owned(), redirect_uri.to_string()),
		];

		self.state.exchange(&self.authenticator, params).await
	}

	/// Revokes only the access token, keeping any refresh token so the
	/// authorization can be re-established.
	pub async fn revoke_access_token(&mut self) -> Result<()> {
		self.state.revoke_access(&self.authenticator).await
	}
}
#[async_trait]
impl TokenAuthorizer for Authorizer {
	fn authenticator(&self) -> &Authenticator {
		&self.authenticator
	}

	fn state(&self) -> &TokenState {
		&self.state
	}

	fn state_mut(&mut self) -> &mut TokenState {
		&mut self.state
	}

	fn can_refresh(&self) -> bool {
		true
	}

	async fn refresh(&mut self) -> Result<()> {
		if let Some(mut hook) = self.pre_refresh_hook.take() {
			hook(&mut self.state);

			self.pre_refresh_hook = Some(hook);
		}

		let Some(refresh_token) = self.state.refresh_token().map(str::to_owned) else {
			return Err(Error::invalid_invocation("refresh token not provided"));
		};
		let params = vec![
			("grant_type".to_owned(), "refresh_token".to_owned()),
			("refresh_token".to_owned(), refresh_token),
		];

		self.state.exchange(&self.authenticator, params).await?;

		if let Some(mut hook) = self.post_refresh_hook.take() {
			hook(&mut self.state);

			self.post_refresh_hook = Some(hook);
		}

		Ok(())
	}

	async fn revoke(&mut self) -> Result<()> {
		// Revoking the refresh token transitively revokes every access token
		// derived from it at the server.
		match self.state.refresh_token().map(str::to_owned) {
			None => self.state.revoke_access(&self.authenticator).await,
			Some(refresh_token) => {
				self.authenticator.revoke_token(&refresh_token, Some("refresh_token")).await?;
				self.state.clear();
				self.state.set_refresh_token(None);

				Ok(())
			},
		}
	}
}

/// Implicit-grant authorizer, constructed already-authorized from the
/// callback payload delivered to the redirect URI.
pub struct ImplicitAuthorizer {
	authenticator: Authenticator,
	state: TokenState,
}
impl ImplicitAuthorizer {
	/// Wraps an access token received in a redirect fragment. Requires a
	/// public authenticator; implicit grants never involve a client secret.
	pub fn new(
		authenticator: Authenticator,
		access_token: impl Into<String>,
		expires_in: i64,
		scope: &str,
	) -> Result<Self> {
		if authenticator.is_confidential() {
			return Err(Error::invalid_invocation(
				"implicit authorization requires a public authenticator",
			));
		}

		let mut state = TokenState::new();

		state.install(access_token.into(), expires_in, scope);

		Ok(Self { authenticator, state })
	}
}
#[async_trait]
impl TokenAuthorizer for ImplicitAuthorizer {
	fn authenticator(&self) -> &Authenticator {
		&self.authenticator
	}

	fn state(&self) -> &TokenState {
		&self.state
	}

	fn state_mut(&mut self) -> &mut TokenState {
		&mut self.state
	}
}

/// Client-credentials authorizer for application-only access without a user
/// context. Some endpoints will not work despite the `*` scope.
pub struct ReadOnlyAuthorizer {
	authenticator: Authenticator,
	state: TokenState,
	scopes: Option<ScopeSet>,
}
impl ReadOnlyAuthorizer {
	/// Creates an unauthorized read-only authorizer. Requires a confidential
	/// authenticator.
	pub fn new(authenticator: Authenticator) -> Result<Self> {
		if !authenticator.is_confidential() {
			return Err(Error::invalid_invocation(
				"read-only authorization requires a confidential authenticator",
			));
		}

		Ok(Self { authenticator, state: TokenState::new(), scopes: None })
	}

	/// Restricts the requested scopes (the server grants `*` by default).
	pub fn with_scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = Some(scopes);

		self
	}
}
#[async_trait]
impl TokenAuthorizer for ReadOnlyAuthorizer {
	fn authenticator(&self) -> &Authenticator {
		&self.authenticator
	}

	fn state(&self) -> &TokenState {
		&self.state
	}

	fn state_mut(&mut self) -> &mut TokenState {
		&mut self.state
	}

	fn can_refresh(&self) -> bool {
		true
	}

	async fn refresh(&mut self) -> Result<()> {
		let mut params = vec![("grant_type".to_owned(), "client_credentials".to_owned())];

		if let Some(scopes) = &self.scopes {
			params.push(("scope".to_owned(), scopes.normalized()));
		}

		self.state.exchange(&self.authenticator, params).await
	}
}

/// Password-grant authorizer for personal-use scripts. Only accounts listed
/// as developers of the application are granted tokens.
pub struct ScriptAuthorizer {
	authenticator: Authenticator,
	state: TokenState,
	username: String,
	password: String,
	two_factor_hook: Option<OtpHook>,
	scopes: Option<ScopeSet>,
}
impl ScriptAuthorizer {
	/// Creates an unauthorized script authorizer. Requires a confidential
	/// authenticator.
	pub fn new(
		authenticator: Authenticator,
		username: impl Into<String>,
		password: impl Into<String>,
	) -> Result<Self> {
		if !authenticator.is_confidential() {
			return Err(Error::invalid_invocation(
				"script authorization requires a confidential authenticator",
			));
		}

		Ok(Self {
			authenticator,
			state: TokenState::new(),
			username: username.into(),
			password: password.into(),
			two_factor_hook: None,
			scopes: None,
		})
	}

	/// Registers a callback producing one-time passcodes, consulted on every
	/// refresh.
	pub fn with_two_factor_hook(mut self, hook: OtpHook) -> Self {
		self.two_factor_hook = Some(hook);

		self
	}

	/// Restricts the requested scopes (the server grants `*` by default).
	pub fn with_scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = Some(scopes);

		self
	}
}
#[async_trait]
impl TokenAuthorizer for ScriptAuthorizer {
	fn authenticator(&self) -> &Authenticator {
		&self.authenticator
	}

	fn state(&self) -> &TokenState {
		&self.state
	}

	fn state_mut(&mut self) -> &mut TokenState {
		&mut self.state
	}

	fn can_refresh(&self) -> bool {
		true
	}

	async fn refresh(&mut self) -> Result<()> {
		let mut params = vec![
			("grant_type".to_owned(), "password".to_owned()),
			("password".to_owned(), self.password.clone()),
			("username".to_owned(), self.username.clone()),
		];

		if let Some(scopes) = &self.scopes {
			params.push(("scope".to_owned(), scopes.normalized()));
		}
		if let Some(otp) = self.two_factor_hook.as_mut().and_then(|hook| hook()) {
			params.push(("otp".to_owned(), otp));
		}

		self.state.exchange(&self.authenticator, params).await
	}
}

/// Installed-client device authorizer for application-only access from
/// distributed (public) apps.
pub struct DeviceAuthorizer {
	authenticator: Authenticator,
	state: TokenState,
	device_id: String,
	scopes: Option<ScopeSet>,
}
impl DeviceAuthorizer {
	/// Creates an unauthorized device authorizer. Either authenticator kind
	/// is accepted; the device identifier defaults to the do-not-track
	/// sentinel.
	pub fn new(authenticator: Authenticator) -> Self {
		Self {
			authenticator,
			state: TokenState::new(),
			device_id: DEFAULT_DEVICE_ID.to_owned(),
			scopes: None,
		}
	}

	/// Sets a unique 20–30 character ASCII device identifier.
	pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
		self.device_id = device_id.into();

		self
	}

	/// Restricts the requested scopes (the server grants `*` by default).
	pub fn with_scopes(mut self, scopes: ScopeSet) -> Self {
		self.scopes = Some(scopes);

		self
	}
}
#[async_trait]
impl TokenAuthorizer for DeviceAuthorizer {
	fn authenticator(&self) -> &Authenticator {
		&self.authenticator
	}

	fn state(&self) -> &TokenState {
		&self.state
	}

	fn state_mut(&mut self) -> &mut TokenState {
		&mut self.state
	}

	fn can_refresh(&self) -> bool {
		true
	}

	async fn refresh(&mut self) -> Result<()> {
		let mut params = vec![
			("device_id".to_owned(), self.device_id.clone()),
			("grant_type".to_owned(), INSTALLED_CLIENT_GRANT.to_owned()),
		];

		if let Some(scopes) = &self.scopes {
			params.push(("scope".to_owned(), scopes.normalized()));
		}

		self.state.exchange(&self.authenticator, params).await
	}
}
