//! Error taxonomy shared across transports, authorizers, and sessions.

// self
use crate::{_prelude::*, http::HttpResponse};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Caller misuse detected locally, before or instead of any network call.
	#[error("invalid invocation: {reason}")]
	InvalidInvocation {
		/// Human-readable description of the misuse.
		reason: String,
	},
	/// Transport-level failure (DNS, TCP, TLS, timeout, interrupted body).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Token endpoint reported a logical OAuth2 error inside an HTTP 200 body.
	#[error(transparent)]
	OAuth(#[from] OAuthError),
	/// Completed HTTP response mapped to an error status.
	#[error(transparent)]
	Response(#[from] ResponseError),
}
impl Error {
	pub(crate) fn invalid_invocation(reason: impl Into<String>) -> Self {
		Self::InvalidInvocation { reason: reason.into() }
	}
}

/// Normalized transport failure carrying the originating request coordinates,
/// so callers can decide retryability without matching on reqwest internals.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed")]
	ClientBuild(#[source] reqwest::Error),
	/// The request failed at the network level before a response completed.
	#[error("error with request {method} {url}")]
	Request {
		/// HTTP method of the failed request.
		method: reqwest::Method,
		/// Target URL of the failed request.
		url: Url,
		/// Underlying transport failure.
		#[source]
		source: reqwest::Error,
	},
}
impl TransportError {
	/// Returns `true` when the underlying cause is one of the transient
	/// failures worth retrying: connect resets, timeouts, and interrupted or
	/// truncated bodies. Anything else propagates on first occurrence.
	pub fn is_retryable(&self) -> bool {
		match self {
			Self::ClientBuild(_) => false,
			Self::Request { source, .. } =>
				source.is_connect()
					|| source.is_timeout()
					|| source.is_body()
					|| source.is_decode(),
		}
	}
}

/// Logical OAuth2 error returned by the token endpoint despite HTTP 200.
#[derive(Debug, ThisError)]
#[error("{error} error processing request{}", description_suffix(.description))]
pub struct OAuthError {
	/// The error type returned by Reddit (e.g. `invalid_grant`).
	pub error: String,
	/// A description of the error, when provided.
	pub description: Option<String>,
	/// The buffered token-endpoint response.
	pub response: Box<HttpResponse>,
}

/// Error family mapped one-to-one from HTTP response statuses; every variant
/// carries the buffered response for inspection.
#[derive(Debug, ThisError)]
pub enum ResponseError {
	/// 400: invalid parameters for the request.
	#[error("received {} HTTP response", status(.0))]
	BadRequest(Box<HttpResponse>),
	/// A success status whose body did not contain valid JSON.
	#[error("received malformed JSON in {} HTTP response", status(.0))]
	BadJson(Box<HttpResponse>),
	/// 409: conflicting change in the target resource.
	#[error("received {} HTTP response", status(.0))]
	Conflict(Box<HttpResponse>),
	/// 403: the authentication is not permitted for the request.
	#[error("received {} HTTP response", status(.0))]
	Forbidden(Box<HttpResponse>),
	/// 403 with an `insufficient_scope` challenge: the request requires a
	/// different scope.
	#[error("received {} HTTP response", status(.0))]
	InsufficientScope(Box<HttpResponse>),
	/// 401 with an `invalid_token` challenge: the access token was rejected.
	#[error("received {} HTTP response", status(.0))]
	InvalidToken(Box<HttpResponse>),
	/// 404: the requested URL was not found.
	#[error("received {} HTTP response", status(.0))]
	NotFound(Box<HttpResponse>),
	/// 301/302: the request resulted in a redirect.
	#[error("redirect to {path}{}", login_hint(.path))]
	Redirect {
		/// Path the response redirects to, with any trailing `.json` stripped.
		path: String,
		/// The buffered redirect response.
		response: Box<HttpResponse>,
	},
	/// 5xx family: issues on the server end preventing request fulfillment.
	#[error("received {} HTTP response", status(.0))]
	ServerError(Box<HttpResponse>),
	/// 415: syntax or spam-prevention issues.
	#[error("special error {message:?}")]
	SpecialError {
		/// Human-readable message extracted from the body.
		message: String,
		/// Machine-readable reason extracted from the body.
		reason: String,
		/// Structured error entries extracted from the body.
		special_errors: Vec<serde_json::Value>,
		/// The buffered response.
		response: Box<HttpResponse>,
	},
	/// 413: the request data exceeds the allowed limit.
	#[error("received {} HTTP response", status(.0))]
	TooLarge(Box<HttpResponse>),
	/// 429: too many requests in a given amount of time.
	#[error("received {} HTTP response{}", status(.response), retry_hint(.retry_after))]
	TooManyRequests {
		/// Raw `Retry-After` header value, when present.
		retry_after: Option<String>,
		/// The buffered response.
		response: Box<HttpResponse>,
	},
	/// 451: the requested URL is unavailable for legal reasons.
	#[error("received {} HTTP response", status(.0))]
	UnavailableForLegalReasons(Box<HttpResponse>),
	/// 414: the length of the request URI exceeds the allowed limit.
	#[error("received {} HTTP response", status(.0))]
	UriTooLong(Box<HttpResponse>),
	/// The token or revoke endpoint returned a non-200 status.
	#[error("received {} HTTP response", status(.0))]
	Unsuccessful(Box<HttpResponse>),
}
impl ResponseError {
	/// The buffered response that produced this error.
	pub fn response(&self) -> &HttpResponse {
		match self {
			Self::BadRequest(response)
			| Self::BadJson(response)
			| Self::Conflict(response)
			| Self::Forbidden(response)
			| Self::InsufficientScope(response)
			| Self::InvalidToken(response)
			| Self::NotFound(response)
			| Self::ServerError(response)
			| Self::TooLarge(response)
			| Self::UnavailableForLegalReasons(response)
			| Self::UriTooLong(response)
			| Self::Unsuccessful(response)
			| Self::Redirect { response, .. }
			| Self::SpecialError { response, .. }
			| Self::TooManyRequests { response, .. } => response.as_ref(),
		}
	}

	/// Maps a status covered by the fixed status table to its error, or hands
	/// the response back unchanged for statuses outside the table.
	pub(crate) fn map_status(response: HttpResponse) -> Result<HttpResponse, Self> {
		let error = match response.status.as_u16() {
			301 | 302 => redirect_error(response),
			400 => Self::BadRequest(response.into()),
			401 | 403 => authorization_error(response),
			404 => Self::NotFound(response.into()),
			409 => Self::Conflict(response.into()),
			413 => Self::TooLarge(response.into()),
			414 => Self::UriTooLong(response.into()),
			415 => special_error(response),
			429 => too_many_requests(response),
			451 => Self::UnavailableForLegalReasons(response.into()),
			500 | 502 | 503 | 504 | 520 | 522 => Self::ServerError(response.into()),
			_ => return Ok(response),
		};

		Err(error)
	}
}

/// Resolves a 401/403 through its `WWW-Authenticate` challenge, falling back
/// to a status-code lookup when the header is absent or unrecognized.
fn authorization_error(response: HttpResponse) -> ResponseError {
	let challenge = response
		.header("www-authenticate")
		.filter(|raw| raw.contains('='))
		.map(|raw| raw.replace('"', ""))
		.and_then(|raw| raw.rsplit('=').next().map(str::to_owned));

	match challenge.as_deref() {
		Some("insufficient_scope") => ResponseError::InsufficientScope(response.into()),
		Some("invalid_token") => ResponseError::InvalidToken(response.into()),
		_ if response.status.as_u16() == 403 => ResponseError::Forbidden(response.into()),
		_ => ResponseError::InvalidToken(response.into()),
	}
}

fn redirect_error(response: HttpResponse) -> ResponseError {
	let path = response.header("location").map(location_path).unwrap_or_default();
	let path = path.strip_suffix(".json").unwrap_or(&path).to_owned();

	ResponseError::Redirect { path, response: response.into() }
}

fn location_path(location: &str) -> String {
	match Url::parse(location) {
		Ok(url) => url.path().to_owned(),
		// Relative redirect targets carry the path directly.
		Err(_) => location.split(['?', '#']).next().unwrap_or_default().to_owned(),
	}
}

fn special_error(response: HttpResponse) -> ResponseError {
	let body = response.json().unwrap_or_default();
	let message =
		body.get("message").and_then(serde_json::Value::as_str).unwrap_or_default().to_owned();
	let reason =
		body.get("reason").and_then(serde_json::Value::as_str).unwrap_or_default().to_owned();
	let special_errors =
		body.get("special_errors").and_then(serde_json::Value::as_array).cloned().unwrap_or_default();

	ResponseError::SpecialError { message, reason, special_errors, response: response.into() }
}

fn too_many_requests(response: HttpResponse) -> ResponseError {
	let retry_after = response.header("retry-after").map(str::to_owned);

	ResponseError::TooManyRequests { retry_after, response: response.into() }
}

fn status(response: &HttpResponse) -> u16 {
	response.status.as_u16()
}

fn description_suffix(description: &Option<String>) -> String {
	description.as_ref().map(|text| format!(" ({text})")).unwrap_or_default()
}

fn login_hint(path: &str) -> &'static str {
	if path.contains("/login/") {
		" (You may be trying to perform a non-read-only action via a read-only instance.)"
	} else {
		""
	}
}

fn retry_hint(retry_after: &Option<String>) -> String {
	retry_after
		.as_deref()
		.and_then(|raw| raw.trim().parse::<f64>().ok())
		.map(|seconds| {
			format!(". Please wait at least {seconds:.2} seconds before re-trying this request.")
		})
		.unwrap_or_default()
}
