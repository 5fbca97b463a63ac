//! Session orchestration: rate-limited, authenticated, retrying API calls.
//!
//! A [`Session`] owns exactly one authorizer and one rate limiter and is the
//! single entry point for API requests. It is not safe for concurrent use;
//! the `&mut self` receiver enforces one logical call at a time, and a
//! deployment needing concurrency constructs one session per worker.

// crates.io
use reqwest::{
	Method, StatusCode,
	header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::TokenAuthorizer,
	error::ResponseError,
	http::{FileUpload, HttpResponse, RequestDescriptor, Transport},
	rate_limit::RateLimiter,
	retry::FiniteRetry,
};

/// Statuses indicating a transient server-side condition worth retrying.
const RETRY_STATUSES: [u16; 7] = [408, 500, 502, 503, 504, 520, 522];
/// Statuses accepted as success once retries settle.
const SUCCESS_STATUSES: [u16; 3] = [200, 201, 202];

/// Parsed body of a successful API call.
#[derive(Clone, Debug, PartialEq)]
pub enum ApiBody {
	/// Structured JSON payload.
	Json(Value),
	/// Success status carrying an explicitly empty body (`Content-Length: 0`).
	Empty,
	/// 204 No Content.
	NoContent,
}

/// Builder describing one API call relative to the OAuth base URL.
///
/// The builder consumes owned values, so nothing the caller holds can alias
/// the request while it is retried.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	method: Method,
	path: String,
	params: Vec<(String, String)>,
	form: Option<BTreeMap<String, String>>,
	json: Option<Value>,
	files: Option<BTreeMap<String, FileUpload>>,
	timeout: Option<StdDuration>,
}
impl ApiRequest {
	/// Creates a request with the given verb and path.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			params: Vec::new(),
			form: None,
			json: None,
			files: None,
			timeout: None,
		}
	}

	/// Creates a GET request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Creates a POST request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// Appends a query parameter.
	pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.params.push((key.into(), value.into()));

		self
	}

	/// Sets a form body field.
	pub fn form_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.form.get_or_insert_with(BTreeMap::new).insert(key.into(), value.into());

		self
	}

	/// Sets the JSON body.
	pub fn json(mut self, json: Value) -> Self {
		self.json = Some(json);

		self
	}

	/// Attaches a file upload, switching the body to multipart.
	pub fn file(mut self, name: impl Into<String>, upload: FileUpload) -> Self {
		self.files.get_or_insert_with(BTreeMap::new).insert(name.into(), upload);

		self
	}

	/// Overrides the per-request timeout.
	pub fn timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = Some(timeout);

		self
	}
}

/// The low-level connection interface to Reddit's API.
pub struct Session {
	authorizer: Box<dyn TokenAuthorizer>,
	rate_limiter: RateLimiter,
	transport: Arc<Transport>,
	retries: u32,
}
impl Session {
	/// Prepares a session over `authorizer`, inheriting the window size and
	/// retry budget from the authorizer's transport configuration.
	pub fn new(authorizer: Box<dyn TokenAuthorizer>) -> Self {
		let transport = authorizer.authenticator().transport().clone();
		let config = transport.config();
		let rate_limiter = RateLimiter::new(config.window_size);
		let retries = config.retries;

		Self { authorizer, rate_limiter, transport, retries }
	}

	/// Overrides the rate limit reset window size, in seconds.
	pub fn with_window_size(mut self, window_size: u64) -> Self {
		self.rate_limiter = RateLimiter::new(window_size);

		self
	}

	/// Overrides the total attempt budget for each logical request.
	pub fn with_retries(mut self, retries: u32) -> Self {
		self.retries = retries;

		self
	}

	/// The authorizer owned by this session.
	pub fn authorizer(&self) -> &dyn TokenAuthorizer {
		self.authorizer.as_ref()
	}

	/// Mutable access to the owned authorizer (e.g. to seed or revoke tokens
	/// between requests).
	pub fn authorizer_mut(&mut self) -> &mut dyn TokenAuthorizer {
		self.authorizer.as_mut()
	}

	/// The rate limiter owned by this session.
	pub fn rate_limiter(&self) -> &RateLimiter {
		&self.rate_limiter
	}

	/// Performs one logical API call and returns its decoded body.
	///
	/// The access token is refreshed automatically when it is invalid and
	/// the authorizer is capable; transient transport and server failures
	/// are retried within the configured budget; the final status is mapped
	/// through the fixed status table.
	pub async fn request(&mut self, request: ApiRequest) -> Result<ApiBody> {
		let descriptor = self.prepare(request)?;

		self.request_with_retries(descriptor).await
	}

	/// Resolves the descriptor for one call: marker fields injected, form
	/// pairs sorted, URL made absolute against the OAuth base.
	fn prepare(&self, request: ApiRequest) -> Result<RequestDescriptor> {
		let config = self.transport.config();
		let url = config
			.oauth_url
			.join(&request.path)
			.map_err(|_| Error::invalid_invocation(format!("invalid path: {}", request.path)))?;
		let mut params = request.params;

		params.push(("raw_json".to_owned(), "1".to_owned()));

		let form = request.form.map(|mut form| {
			form.insert("api_type".to_owned(), "json".to_owned());

			form.into_iter().collect::<Vec<_>>()
		});
		let json = request.json.map(|mut json| {
			if let Value::Object(object) = &mut json {
				object.insert("api_type".to_owned(), Value::String("json".to_owned()));
			}

			json
		});
		let mut descriptor = RequestDescriptor::new(
			request.method,
			url,
			request.timeout.unwrap_or(config.timeout),
		);

		descriptor.params = params;
		descriptor.form = form;
		descriptor.json = json;
		descriptor.files = request.files;

		Ok(descriptor)
	}

	/// Iterative retry loop threading an immutable [`FiniteRetry`] value.
	async fn request_with_retries(&mut self, descriptor: RequestDescriptor) -> Result<ApiBody> {
		let mut retry = FiniteRetry::new(self.retries);

		loop {
			retry.sleep_before_retry().await;
			tracing::debug!(method = %descriptor.method, url = %descriptor.url, "fetching");
			self.rate_limiter.delay().await;

			let mut attempt = descriptor.clone();

			attempt.headers = self.bearer_headers().await?;

			let response = match self.transport.send(&attempt).await {
				Ok(response) => response,
				Err(failure) => {
					if !retry.should_retry() || !failure.is_retryable() {
						return Err(failure.into());
					}

					tracing::warn!(
						cause = %failure,
						method = %descriptor.method,
						url = %descriptor.url,
						"retrying request"
					);

					retry = retry.consume();

					continue;
				},
			};

			self.rate_limiter.update(&response.headers);
			tracing::debug!(
				status = response.status.as_u16(),
				content_length = response.header("content-length"),
				ratelimit_reset = response.header("x-ratelimit-reset"),
				ratelimit_remaining = response.header("x-ratelimit-remaining"),
				ratelimit_used = response.header("x-ratelimit-used"),
				"response"
			);

			let mut reauthorize = false;

			if response.status == StatusCode::UNAUTHORIZED {
				// The token was rejected; drop it and, where a refresh path
				// exists, spend one retry on re-authentication.
				self.authorizer.clear();

				reauthorize = self.authorizer.can_refresh();
			}
			if retry.should_retry()
				&& (reauthorize || RETRY_STATUSES.contains(&response.status.as_u16()))
			{
				tracing::warn!(
					status = response.status.as_u16(),
					method = %descriptor.method,
					url = %descriptor.url,
					"retrying request"
				);

				retry = retry.consume();

				continue;
			}

			return finalize(response);
		}
	}

	/// Builds the bearer header for one attempt, refreshing first when the
	/// token is invalid and the authorizer can mint a new one.
	async fn bearer_headers(&mut self) -> Result<HeaderMap> {
		if !self.authorizer.is_valid() && self.authorizer.can_refresh() {
			self.authorizer.refresh().await?;
		}

		let bearer = format!("bearer {}", self.authorizer.access_token().unwrap_or_default());
		let mut value = HeaderValue::from_str(&bearer).map_err(|_| {
			Error::invalid_invocation("access token contains invalid header characters")
		})?;

		value.set_sensitive(true);

		let mut headers = HeaderMap::new();

		headers.insert(AUTHORIZATION, value);

		Ok(headers)
	}
}

/// Maps the settled response to a body or an error.
fn finalize(response: HttpResponse) -> Result<ApiBody> {
	let response = ResponseError::map_status(response)?;

	if response.status == StatusCode::NO_CONTENT {
		return Ok(ApiBody::NoContent);
	}

	// Non-retryable, non-success statuses outside the table cannot occur
	// given the table's coverage.
	assert!(
		SUCCESS_STATUSES.contains(&response.status.as_u16()),
		"unexpected status code: {}",
		response.status,
	);

	if response.header("content-length") == Some("0") {
		return Ok(ApiBody::Empty);
	}

	match response.json() {
		Ok(value) => Ok(ApiBody::Json(value)),
		Err(_) => Err(ResponseError::BadJson(Box::new(response)).into()),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use reqwest::header::HeaderMap;
	// self
	use super::*;
	use crate::{
		auth::{Authenticator, Authorizer},
		config::Config,
	};

	fn response_with(status: StatusCode, headers: &[(&str, &str)], body: &str) -> HttpResponse {
		let mut map = HeaderMap::new();

		for (name, value) in headers {
			map.insert(
				reqwest::header::HeaderName::from_bytes(name.as_bytes())
					.expect("Header fixture name should be valid."),
				value.parse().expect("Header fixture value should be valid."),
			);
		}

		HttpResponse {
			status,
			headers: map,
			url: Url::parse("https://oauth.reddit.com/r/test").expect("Fixture URL should parse."),
			body: body.as_bytes().to_vec(),
		}
	}

	fn session() -> Session {
		let transport = Arc::new(
			Transport::new("test-suite/0.1", Config::default())
				.expect("Test transport should build."),
		);

		Session::new(Box::new(Authorizer::new(Authenticator::public(transport, "client-id"))))
	}

	#[test]
	fn prepare_injects_marker_fields_and_sorts_the_form() {
		let descriptor = session()
			.prepare(
				ApiRequest::post("/api/submit")
					.param("limit", "10")
					.form_field("title", "hello")
					.form_field("kind", "self"),
			)
			.expect("Descriptor preparation should succeed.");

		assert_eq!(descriptor.url.as_str(), "https://oauth.reddit.com/api/submit");
		assert!(descriptor.params.contains(&("raw_json".to_owned(), "1".to_owned())));

		let form = descriptor.form.expect("A form body should be present.");

		assert_eq!(
			form,
			vec![
				("api_type".to_owned(), "json".to_owned()),
				("kind".to_owned(), "self".to_owned()),
				("title".to_owned(), "hello".to_owned()),
			],
		);
	}

	#[test]
	fn prepare_marks_json_objects_only() {
		let object = session()
			.prepare(ApiRequest::post("/api/widget").json(serde_json::json!({"kind": "menu"})))
			.expect("Descriptor preparation should succeed.");

		assert_eq!(
			object.json,
			Some(serde_json::json!({"kind": "menu", "api_type": "json"})),
		);

		let array = session()
			.prepare(ApiRequest::post("/api/widget").json(serde_json::json!(["a", "b"])))
			.expect("Descriptor preparation should succeed.");

		assert_eq!(array.json, Some(serde_json::json!(["a", "b"])));
	}

	#[test]
	fn finalize_distinguishes_empty_bodies() {
		assert_eq!(
			finalize(response_with(StatusCode::NO_CONTENT, &[], ""))
				.expect("204 should finalize."),
			ApiBody::NoContent,
		);
		assert_eq!(
			finalize(response_with(StatusCode::OK, &[("content-length", "0")], ""))
				.expect("Empty 200 should finalize."),
			ApiBody::Empty,
		);
		assert_eq!(
			finalize(response_with(StatusCode::OK, &[], "{\"kind\": \"t3\"}"))
				.expect("JSON 200 should finalize."),
			ApiBody::Json(serde_json::json!({"kind": "t3"})),
		);
	}

	#[test]
	fn finalize_rejects_invalid_json() {
		let result = finalize(response_with(StatusCode::OK, &[], "<html>"));

		assert!(matches!(
			result,
			Err(Error::Response(ResponseError::BadJson(_)))
		));
	}
}
