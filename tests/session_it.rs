// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use httpmock::prelude::*;
use serde_json::json;
use url::Url;
// self
use reddit_session::{
	auth::{Authenticator, Authorizer, ScriptAuthorizer},
	config::Config,
	error::{Error, ResponseError},
	http::Transport,
	session::{ApiBody, ApiRequest, Session},
};

const CLIENT_ID: &str = "client-it";
const CLIENT_SECRET: &str = "secret-it";

fn transport(server: &MockServer) -> Arc<Transport> {
	let base = Url::parse(&server.base_url()).expect("Mock server URL should parse.");
	let config = Config::default().with_reddit_url(base.clone()).with_oauth_url(base);

	Arc::new(Transport::new("reddit-session tests/0.1", config).expect("Transport should build."))
}

/// Session over a script authorizer whose token endpoint mints `token`.
async fn script_session(server: &MockServer, token: &str) -> Session {
	server
		.mock_async(|when, then| {
			when.method(POST).path("/api/v1/access_token");
			then.status(200).header("content-type", "application/json").body(format!(
				"{{\"access_token\":\"{token}\",\"expires_in\":3600,\"scope\":\"*\"}}"
			));
		})
		.await;

	let authenticator = Authenticator::confidential(transport(server), CLIENT_ID, CLIENT_SECRET);
	let authorizer = ScriptAuthorizer::new(authenticator, "developer", "hunter2")
		.expect("A confidential script authorizer should build.");

	Session::new(Box::new(authorizer))
}

#[tokio::test]
async fn request_authenticates_and_parses_the_body() {
	let server = MockServer::start_async().await;
	let mut session = script_session(&server, "bearer-one").await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v1/me")
				.query_param("raw_json", "1")
				.header("authorization", "bearer bearer-one");
			then.status(200)
				.header("content-type", "application/json")
				.header("x-ratelimit-remaining", "599.0")
				.header("x-ratelimit-used", "1")
				.header("x-ratelimit-reset", "600")
				.body("{\"name\":\"tester\"}");
		})
		.await;
	let body = session
		.request(ApiRequest::get("/api/v1/me"))
		.await
		.expect("An authenticated GET should succeed.");

	mock.assert_async().await;

	assert_eq!(body, ApiBody::Json(json!({"name": "tester"})));
	// The limiter absorbed the response feedback.
	assert_eq!(session.rate_limiter().used(), Some(1));
	assert_eq!(session.rate_limiter().remaining(), Some(599.));
	assert!(session.rate_limiter().next_allowed_at().is_some());
}

#[tokio::test]
async fn no_content_and_empty_bodies_are_distinguished() {
	let server = MockServer::start_async().await;
	let mut session = script_session(&server, "bearer-two").await;

	server
		.mock_async(|when, then| {
			when.method(DELETE).path("/api/v1/me/friends/spez");
			then.status(204);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/empty");
			then.status(200);
		})
		.await;

	let no_content = session
		.request(ApiRequest::new(reqwest::Method::DELETE, "/api/v1/me/friends/spez"))
		.await
		.expect("A 204 response should finalize.");

	assert_eq!(no_content, ApiBody::NoContent);

	let empty = session
		.request(ApiRequest::get("/api/empty"))
		.await
		.expect("An empty 200 response should finalize.");

	assert_eq!(empty, ApiBody::Empty);
}

#[tokio::test]
async fn not_found_is_not_retried() {
	let server = MockServer::start_async().await;
	let mut session = script_session(&server, "bearer-three").await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/r/missing/about");
			then.status(404).header("content-type", "application/json").body("{}");
		})
		.await;
	let error = session
		.request(ApiRequest::get("/r/missing/about"))
		.await
		.expect_err("A 404 should surface an error.");

	mock.assert_async().await;

	assert!(matches!(error, Error::Response(ResponseError::NotFound(_))));
}

#[tokio::test]
async fn server_errors_consume_the_retry_budget() {
	let server = MockServer::start_async().await;
	let mut session = script_session(&server, "bearer-four").await.with_retries(2);
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/r/flaky/about");
			then.status(503);
		})
		.await;
	let error = session
		.request(ApiRequest::get("/r/flaky/about"))
		.await
		.expect_err("A persistent 503 should surface an error.");

	mock.assert_calls_async(2).await;

	assert!(matches!(error, Error::Response(ResponseError::ServerError(_))));
}

#[tokio::test]
async fn transport_timeouts_retry_then_propagate() {
	let server = MockServer::start_async().await;
	let mut session = script_session(&server, "bearer-five").await.with_retries(3);
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/r/slow/about");
			then.status(200).delay(StdDuration::from_secs(2));
		})
		.await;
	let error = session
		.request(
			ApiRequest::get("/r/slow/about").timeout(StdDuration::from_millis(300)),
		)
		.await
		.expect_err("Three consecutive timeouts should exhaust the budget.");

	// Budget of three: the third timeout propagates with no further retry.
	mock.assert_calls_async(3).await;

	let Error::Transport(transport_error) = error else {
		panic!("expected a transport error, got {error:?}");
	};

	assert!(transport_error.is_retryable());
}

#[tokio::test]
async fn unauthorized_triggers_exactly_one_reauthentication() {
	let server = MockServer::start_async().await;
	// The initial grant consumes the first refresh token and rotates in a
	// second one; the re-authentication after the 401 consumes that.
	let first_grant = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/v1/access_token")
				.body_includes("refresh_token=first-refresh");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"token-one\",\"expires_in\":3600,\"scope\":\"*\",\"refresh_token\":\"second-refresh\"}",
			);
		})
		.await;
	let second_grant = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/api/v1/access_token")
				.body_includes("refresh_token=second-refresh");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"token-two\",\"expires_in\":3600,\"scope\":\"*\"}",
			);
		})
		.await;
	let rejected = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v1/me")
				.header("authorization", "bearer token-one");
			then.status(401)
				.header("www-authenticate", "Bearer realm=\"reddit\", error=\"invalid_token\"");
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/v1/me")
				.header("authorization", "bearer token-two");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"name\":\"tester\"}");
		})
		.await;
	let authenticator = Authenticator::confidential(transport(&server), CLIENT_ID, CLIENT_SECRET);
	let authorizer = Authorizer::new(authenticator).with_refresh_token("first-refresh");
	let mut session = Session::new(Box::new(authorizer));
	let body = session
		.request(ApiRequest::get("/api/v1/me"))
		.await
		.expect("The retried request should settle on the 200.");

	assert_eq!(body, ApiBody::Json(json!({"name": "tester"})));

	first_grant.assert_async().await;
	second_grant.assert_async().await;
	rejected.assert_async().await;
	accepted.assert_async().await;
}

#[tokio::test]
async fn too_many_requests_captures_retry_after() {
	let server = MockServer::start_async().await;
	let mut session = script_session(&server, "bearer-six").await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/me");
			then.status(429).header("retry-after", "5").body("slow down");
		})
		.await;
	let error = session
		.request(ApiRequest::get("/api/v1/me"))
		.await
		.expect_err("A 429 should surface an error.");

	// 429 is not in the retryable status set.
	mock.assert_async().await;

	assert!(error.to_string().contains("5.00 seconds"));

	let Error::Response(ResponseError::TooManyRequests { retry_after, .. }) = error else {
		panic!("expected a too-many-requests error, got {error:?}");
	};

	assert_eq!(retry_after.as_deref(), Some("5"));
}

#[tokio::test]
async fn exhausted_quota_defers_to_the_reset_instant() {
	let server = MockServer::start_async().await;
	let mut session = script_session(&server, "bearer-seven").await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/me");
			then.status(200)
				.header("content-type", "application/json")
				.header("x-ratelimit-remaining", "0")
				.header("x-ratelimit-used", "600")
				.header("x-ratelimit-reset", "30")
				.body("{}");
		})
		.await;
	session
		.request(ApiRequest::get("/api/v1/me"))
		.await
		.expect("The metered request should succeed.");

	let limiter = session.rate_limiter();

	assert_eq!(limiter.remaining(), Some(0.));
	assert_eq!(limiter.next_allowed_at(), limiter.reset_at());
}

#[tokio::test]
async fn malformed_success_bodies_are_bad_json() {
	let server = MockServer::start_async().await;
	let mut session = script_session(&server, "bearer-eight").await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/api/v1/me");
			then.status(200).header("content-type", "text/html").body("<html></html>");
		})
		.await;

	let error = session
		.request(ApiRequest::get("/api/v1/me"))
		.await
		.expect_err("An unparsable success body should surface an error.");

	assert!(matches!(error, Error::Response(ResponseError::BadJson(_))));
}
