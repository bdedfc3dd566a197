#![cfg(feature = "reqwest")]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
// self
use api_courier::{
	auth::{AccessToken, TokenIdentity},
	cache::MemoryCache,
	config::{ClientConfig, OAuth2Config},
	dispatch::{ApiRequest, RequestDispatcher},
	error::{Error, RateLimitError},
	http::MultipartPart,
	sleep::{NoopSleeper, RecordingSleeper},
	store::{CacheTokenStorage, TokenStorage},
};

fn base_config(server: &MockServer) -> ClientConfig {
	ClientConfig::new(server.url("/v1")).expect("Mock base URL should be accepted.")
}

fn build(config: ClientConfig, cache: MemoryCache, sleeper: RecordingSleeper) -> RequestDispatcher {
	RequestDispatcher::builder(config)
		.cache(Arc::new(cache))
		.sleeper(Arc::new(sleeper))
		.build()
		.expect("Dispatcher should build with the default reqwest transport.")
}

#[test]
fn api_key_requests_carry_bearer_and_accept_headers() {
	let server = MockServer::start();
	let mock = server.mock(|when, then| {
		when.method(GET)
			.path("/v1/contacts")
			.query_param("page", "1")
			.header("authorization", "Bearer key-123")
			.header("accept", "application/json");
		then.status(200).header("content-type", "application/json").body("[{\"id\":7}]");
	});
	let dispatcher = build(
		base_config(&server).with_api_key("key-123"),
		MemoryCache::default(),
		RecordingSleeper::default(),
	);
	let response = dispatcher
		.send(&ApiRequest::get("contacts").query("page", "1"))
		.expect("Contacts request should succeed.");
	let contacts: Vec<serde_json::Value> =
		response.json().expect("Contacts payload should decode.");

	mock.assert();

	assert_eq!(response.status, 200);
	assert_eq!(contacts[0]["id"], 7);
	assert_eq!(response.header("Content-Type"), Some("application/json"));
}

#[test]
fn idempotent_server_errors_are_retried_until_attempts_run_out() {
	let server = MockServer::start();
	let mock = server.mock(|when, then| {
		when.method(GET).path("/v1/vouchers");
		then.status(503).body("maintenance");
	});
	let sleeper = RecordingSleeper::default();
	let dispatcher = build(base_config(&server), MemoryCache::default(), sleeper.clone());
	let err = dispatcher.get("vouchers").expect_err("Persistent 503 should surface.");

	mock.assert_calls(3);

	assert_eq!(err.as_api().map(|api| (api.status, api.body.as_str())), Some((503, "maintenance")));
	assert_eq!(sleeper.delays(), vec![200_000, 400_000]);
	assert_eq!(dispatcher.metrics().attempts(), 3);
}

#[test]
fn non_idempotent_server_errors_are_not_retried() {
	let server = MockServer::start();
	let mock = server.mock(|when, then| {
		when.method(POST).path("/v1/invoices").header("content-type", "application/json");
		then.status(500).body("boom");
	});
	let sleeper = RecordingSleeper::default();
	let dispatcher = build(base_config(&server), MemoryCache::default(), sleeper.clone());
	let err = dispatcher
		.post("invoices", serde_json::json!({ "total": 10 }))
		.expect_err("POST should fail on the first 500.");

	mock.assert_calls(1);

	assert_eq!(err.as_api().map(|api| api.status), Some(500));
	assert!(sleeper.delays().is_empty());
}

#[test]
fn client_errors_are_returned_verbatim() {
	let server = MockServer::start();
	let mock = server.mock(|when, then| {
		when.method(PUT).path("/v1/contacts/9");
		then.status(422).header("x-request-id", "req-1").body("{\"message\":\"invalid\"}");
	});
	let dispatcher =
		build(base_config(&server), MemoryCache::default(), RecordingSleeper::default());
	let err = dispatcher
		.put("contacts/9", serde_json::json!({ "name": "" }))
		.expect_err("422 should not be retried.");
	let Error::Api(api) = err else {
		panic!("Expected an API error.");
	};

	mock.assert_calls(1);

	assert_eq!(api.status, 422);
	assert_eq!(api.body, "{\"message\":\"invalid\"}");
	assert_eq!(api.headers.get("x-request-id").map(String::as_str), Some("req-1"));
}

#[test]
fn multipart_uploads_reach_the_server() {
	let server = MockServer::start();
	let mock = server.mock(|when, then| {
		when.method(POST).path("/v1/files");
		then.status(201).body("{\"id\":\"file-1\"}");
	});
	let dispatcher =
		build(base_config(&server), MemoryCache::default(), RecordingSleeper::default());
	let request = ApiRequest::post("files").multipart(vec![
		MultipartPart::bytes("file", b"%PDF-1.7".to_vec())
			.with_filename("invoice.pdf")
			.with_content_type("application/pdf"),
		MultipartPart::text("type", "voucher"),
	]);
	let response = dispatcher.send(&request).expect("Upload should succeed.");

	mock.assert();

	assert_eq!(response.status, 201);
}

#[test]
fn local_rate_limit_blocks_before_the_network() {
	let server = MockServer::start();
	let mock = server.mock(|when, then| {
		when.method(GET).path("/v1/ping");
		then.status(204);
	});
	let dispatcher = build(
		base_config(&server).with_rate_limit("tenant-1", 3),
		MemoryCache::default(),
		RecordingSleeper::default(),
	);

	for _ in 0..3 {
		dispatcher.get("ping").expect("Calls within the window should pass.");
	}

	let err = dispatcher.get("ping").expect_err("The fourth call should be rejected locally.");

	mock.assert_calls(3);

	let Error::RateLimited(RateLimitError { key, retry_after_seconds }) = err else {
		panic!("Expected a local rate-limit rejection.");
	};

	assert_eq!(key, "tenant-1");
	assert!((1..=60).contains(&retry_after_seconds));
	assert_eq!(
		dispatcher.rate_limit_gate().remaining("tenant-1", 3).expect("Lookup should succeed."),
		0
	);
}

#[test]
fn unauthorized_response_refreshes_once_and_replays() {
	let server = MockServer::start();
	let stale = server.mock(|when, then| {
		when.method(GET).path("/v1/profile").header("authorization", "Bearer access-1");
		then.status(401).body("{\"message\":\"expired\"}");
	});
	let fresh = server.mock(|when, then| {
		when.method(GET).path("/v1/profile").header("authorization", "Bearer access-2");
		then.status(200).body("{\"name\":\"Ada\"}");
	});
	let token_endpoint = server.mock(|when, then| {
		when.method(POST)
			.path("/oauth2/token")
			.header("content-type", "application/x-www-form-urlencoded");
		then.status(200)
			.header("content-type", "application/json")
			.body("{\"access_token\":\"access-2\",\"refresh_token\":\"refresh-2\",\"expires_in\":3600}");
	});
	let oauth2 = OAuth2Config::builder("client-id", "client-secret")
		.base_url(server.base_url())
		.redirect_uri("https://app.example.com/callback")
		.build()
		.expect("OAuth2 config should build.");
	let cache = MemoryCache::default();
	let seeded = AccessToken::builder()
		.access_token("access-1")
		.refresh_token("refresh-1")
		.expires_in(3600)
		.build()
		.expect("Token fixture should build.");

	CacheTokenStorage::new(Arc::new(cache.clone()))
		.store(&TokenIdentity::default(), &seeded)
		.expect("Seeding the token should succeed.");

	let dispatcher = RequestDispatcher::builder(base_config(&server).with_oauth2(oauth2))
		.cache(Arc::new(cache))
		.sleeper(Arc::new(NoopSleeper))
		.build()
		.expect("Dispatcher should build.");
	let response = dispatcher.get("profile").expect("Replay after refresh should succeed.");

	stale.assert_calls(1);
	token_endpoint.assert_calls(1);
	fresh.assert_calls(1);

	assert_eq!(response.text(), "{\"name\":\"Ada\"}");
	assert_eq!(dispatcher.metrics().auth_refreshes(), 1);

	let stored = dispatcher
		.token_manager()
		.expect("OAuth2 credentials should expose the manager.")
		.current_token()
		.expect("Storage read should succeed.")
		.expect("Refreshed token should be stored.");

	assert_eq!(stored.access_token().expose(), "access-2");
	assert_eq!(stored.refresh_token().map(|secret| secret.expose()), Some("refresh-2"));
}
