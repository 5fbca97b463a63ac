//! Transport primitives: the shared HTTP client, per-call request
//! descriptors, and fully-buffered response snapshots.
//!
//! [`Transport::send`] normalizes every network-level failure into a single
//! [`TransportError`] carrying the request coordinates, so callers decide
//! retryability without depending on reqwest's exception surface. Redirects
//! are disabled on the shared client; 301/302 responses surface to the status
//! mapper instead of being followed.

// crates.io
use reqwest::{
	Client, Method, StatusCode,
	header::HeaderMap,
	multipart::{Form, Part},
	redirect,
};
use serde_json::Value;
// self
use crate::{_prelude::*, config::Config, error::TransportError};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// In-memory file payload attached to a multipart upload.
#[derive(Clone, Debug)]
pub struct FileUpload {
	/// File name reported to the server.
	pub filename: String,
	/// Raw file contents.
	pub contents: Vec<u8>,
}
impl FileUpload {
	/// Creates a new upload from a file name and its contents.
	pub fn new(filename: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
		Self { filename: filename.into(), contents: contents.into() }
	}
}

/// Wire-level description of one API call, rebuilt into a fresh reqwest
/// request for every retry attempt.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
	/// Request verb.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Query parameters.
	pub params: Vec<(String, String)>,
	/// Sorted form pairs sent urlencoded, or as text parts of a multipart
	/// body when file uploads are present.
	pub form: Option<Vec<(String, String)>>,
	/// JSON body.
	pub json: Option<Value>,
	/// Multipart file uploads, keyed by field name.
	pub files: Option<BTreeMap<String, FileUpload>>,
	/// Extra headers for this attempt (authorization material).
	pub headers: HeaderMap,
	/// Per-request timeout.
	pub timeout: StdDuration,
}
impl RequestDescriptor {
	/// Creates a descriptor with no parameters or body.
	pub fn new(method: Method, url: Url, timeout: StdDuration) -> Self {
		Self {
			method,
			url,
			params: Vec::new(),
			form: None,
			json: None,
			files: None,
			headers: HeaderMap::new(),
			timeout,
		}
	}
}

/// Fully-buffered snapshot of an HTTP response.
#[derive(Clone, Debug)]
pub struct HttpResponse {
	/// Response status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Final URL the response was served from.
	pub url: Url,
	/// Raw body bytes.
	pub body: Vec<u8>,
}
impl HttpResponse {
	/// Returns a header value as a string, when present and valid UTF-8.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}

	/// Returns the body decoded as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Parses the body as JSON.
	pub fn json(&self) -> serde_json::Result<Value> {
		serde_json::from_slice(&self.body)
	}
}

/// Issues single HTTP requests with normalized failures.
///
/// Owns the shared reqwest client and the endpoint configuration. One
/// transport is shared by an authenticator and every session built over it.
#[derive(Clone, Debug)]
pub struct Transport {
	client: Client,
	config: Config,
}
impl Transport {
	/// Builds a transport advertising `user_agent`, suffixed with this
	/// crate's name and version.
	///
	/// Fails with an invalid-invocation error when the user agent is not
	/// descriptive (fewer than 7 characters).
	pub fn new(user_agent: &str, config: Config) -> Result<Self> {
		if user_agent.len() < 7 {
			return Err(Error::invalid_invocation("user_agent is not descriptive"));
		}

		let client = Client::builder()
			.user_agent(format!("{user_agent} reddit-session/{VERSION}"))
			.redirect(redirect::Policy::none())
			.build()
			.map_err(TransportError::ClientBuild)?;

		Ok(Self { client, config })
	}

	/// The endpoint configuration this transport was built with.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Issues the described request and buffers the full response.
	///
	/// Every failure between here and a completed body read is normalized
	/// into [`TransportError`].
	pub async fn send(
		&self,
		descriptor: &RequestDescriptor,
	) -> Result<HttpResponse, TransportError> {
		let mut request = self
			.client
			.request(descriptor.method.clone(), descriptor.url.clone())
			.headers(descriptor.headers.clone())
			.timeout(descriptor.timeout);

		if !descriptor.params.is_empty() {
			request = request.query(&descriptor.params);
		}
		if let Some(files) = &descriptor.files {
			let mut form = Form::new();

			if let Some(pairs) = &descriptor.form {
				for (name, value) in pairs {
					form = form.text(name.clone(), value.clone());
				}
			}
			for (name, upload) in files {
				form = form.part(
					name.clone(),
					Part::bytes(upload.contents.clone()).file_name(upload.filename.clone()),
				);
			}

			request = request.multipart(form);
		} else if let Some(pairs) = &descriptor.form {
			request = request.form(pairs);
		} else if let Some(json) = &descriptor.json {
			request = request.json(json);
		}

		let failure = |source| TransportError::Request {
			method: descriptor.method.clone(),
			url: descriptor.url.clone(),
			source,
		};
		let response = request.send().await.map_err(failure)?;
		let status = response.status();
		let headers = response.headers().to_owned();
		let url = response.url().to_owned();
		let body = response.bytes().await.map_err(failure)?.to_vec();

		Ok(HttpResponse { status, headers, url, body })
	}
}
