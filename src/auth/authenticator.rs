//! OAuth2 client identity: Basic-Auth material, authorization URLs, and
//! token revocation.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::{
	Method, StatusCode,
	header::{CONNECTION, HeaderMap, HeaderValue},
};
// self
use crate::{
	_prelude::*,
	auth::ScopeSet,
	config::{AUTHORIZATION_PATH, REVOKE_TOKEN_PATH},
	error::ResponseError,
	http::{HttpResponse, RequestDescriptor, Transport},
};

/// Requested lifetime of an authorization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenDuration {
	/// Access tokens lasting one hour, with no refresh token.
	Temporary,
	/// Access tokens accompanied by an indefinitely reusable refresh token.
	Permanent,
}
impl TokenDuration {
	/// Wire value of the `duration` authorization parameter.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Temporary => "temporary",
			Self::Permanent => "permanent",
		}
	}
}
impl Display for TokenDuration {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// A single OAuth2 application identity.
///
/// An authenticator constructed with a client secret is *confidential*; one
/// without is *public* (installed apps). The kind decides which grants and
/// flows the authorizer variants accept, and which Basic-Auth material is
/// sent to the token endpoint—public identities never transmit a secret.
#[derive(Clone, Debug)]
pub struct Authenticator {
	transport: Arc<Transport>,
	client_id: String,
	client_secret: Option<String>,
	redirect_uri: Option<Url>,
}
impl Authenticator {
	/// Creates a confidential identity (web or script type apps).
	pub fn confidential(
		transport: Arc<Transport>,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Self {
		Self {
			transport,
			client_id: client_id.into(),
			client_secret: Some(client_secret.into()),
			redirect_uri: None,
		}
	}

	/// Creates a public identity (installed apps without a secret).
	pub fn public(transport: Arc<Transport>, client_id: impl Into<String>) -> Self {
		Self { transport, client_id: client_id.into(), client_secret: None, redirect_uri: None }
	}

	/// Sets the redirect URI, exactly as registered in the application's
	/// OAuth settings. Required by [`authorize_url`](Self::authorize_url) and
	/// the code-grant exchange.
	pub fn with_redirect_uri(mut self, redirect_uri: Url) -> Self {
		self.redirect_uri = Some(redirect_uri);

		self
	}

	/// The OAuth2 client ID.
	pub fn client_id(&self) -> &str {
		&self.client_id
	}

	/// The configured redirect URI, if any.
	pub fn redirect_uri(&self) -> Option<&Url> {
		self.redirect_uri.as_ref()
	}

	/// Returns `true` when this identity carries a client secret.
	pub fn is_confidential(&self) -> bool {
		self.client_secret.is_some()
	}

	pub(crate) fn transport(&self) -> &Arc<Transport> {
		&self.transport
	}

	/// Builds the URL used out-of-band to grant access to the application.
	///
	/// Fails with an invalid-invocation error when no redirect URI is
	/// configured, when `implicit` is requested on a confidential identity,
	/// or when `implicit` is combined with a non-temporary duration (implicit
	/// grants cannot mint refresh tokens).
	pub fn authorize_url(
		&self,
		duration: TokenDuration,
		scopes: &ScopeSet,
		state: &str,
		implicit: bool,
	) -> Result<Url> {
		let Some(redirect_uri) = &self.redirect_uri else {
			return Err(Error::invalid_invocation("redirect URI not provided"));
		};

		if implicit && self.is_confidential() {
			return Err(Error::invalid_invocation(
				"only public authenticators can use the implicit grant flow",
			));
		}
		if implicit && duration != TokenDuration::Temporary {
			return Err(Error::invalid_invocation(
				"the implicit grant flow only supports temporary access tokens",
			));
		}

		let mut url = self
			.transport
			.config()
			.reddit_url
			.join(AUTHORIZATION_PATH)
			.map_err(|_| Error::invalid_invocation("authorization endpoint URL is invalid"))?;

		url.query_pairs_mut()
			.append_pair("client_id", &self.client_id)
			.append_pair("duration", duration.as_str())
			.append_pair("redirect_uri", redirect_uri.as_str())
			.append_pair("response_type", if implicit { "token" } else { "code" })
			.append_pair("scope", &scopes.normalized())
			.append_pair("state", state);

		Ok(url)
	}

	/// Asks Reddit to revoke the provided token.
	///
	/// `token_type_hint` (`"access_token"` or `"refresh_token"`) is an
	/// optional efficiency hint for the server.
	pub async fn revoke_token(&self, token: &str, token_type_hint: Option<&str>) -> Result<()> {
		let mut data = vec![("token".to_owned(), token.to_owned())];

		if let Some(hint) = token_type_hint {
			data.push(("token_type_hint".to_owned(), hint.to_owned()));
		}

		self.post(REVOKE_TOKEN_PATH, data).await.map(|_| ())
	}

	/// Form POST against a token-service path with this identity's
	/// Basic-Auth material and a `Connection: close` header. Form pairs are
	/// sorted for a stable wire shape; any non-200 status is an error.
	pub(crate) async fn post(
		&self,
		path: &str,
		mut data: Vec<(String, String)>,
	) -> Result<HttpResponse> {
		data.sort();

		let config = self.transport.config();
		let url = config
			.reddit_url
			.join(path)
			.map_err(|_| Error::invalid_invocation("token endpoint URL is invalid"))?;
		let mut descriptor = RequestDescriptor::new(Method::POST, url, config.timeout);
		let mut headers = HeaderMap::new();

		headers.insert(CONNECTION, HeaderValue::from_static("close"));
		headers.insert(reqwest::header::AUTHORIZATION, self.basic_auth_header()?);

		descriptor.headers = headers;
		descriptor.form = Some(data);

		let response = self.transport.send(&descriptor).await?;

		if response.status != StatusCode::OK {
			return Err(ResponseError::Unsuccessful(Box::new(response)).into());
		}

		Ok(response)
	}

	/// Basic-Auth material: `(client_id, client_secret)` for confidential
	/// identities, `(client_id, "")` for public ones.
	fn basic_auth_header(&self) -> Result<HeaderValue> {
		let material =
			format!("{}:{}", self.client_id, self.client_secret.as_deref().unwrap_or(""));
		let mut value = HeaderValue::from_str(&format!("Basic {}", STANDARD.encode(material)))
			.map_err(|_| {
				Error::invalid_invocation("client credentials contain invalid header characters")
			})?;

		value.set_sensitive(true);

		Ok(value)
	}
}
