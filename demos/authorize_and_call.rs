//! Walks the full lifecycle against a local mock server: build the PKCE authorization URL,
//! exchange the returned code, then call the API with the stored token, which is refreshed
//! transparently after a `401`.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use api_courier::{
	cache::MemoryCache,
	config::{ClientConfig, OAuth2Config},
	dispatch::{ApiRequest, RequestDispatcher},
};

fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start();
	let token_mock = server.mock(|when, then| {
		when.method(POST).path("/oauth2/token");
		then.status(200).header("content-type", "application/json").body(
			"{\"access_token\":\"demo-access\",\"refresh_token\":\"demo-refresh\",\"expires_in\":900}",
		);
	});
	let api_mock = server.mock(|when, then| {
		when.method(GET).path("/v1/contacts").header("authorization", "Bearer demo-access");
		then.status(200).header("content-type", "application/json").body("[{\"id\":1}]");
	});
	let oauth2 = OAuth2Config::builder("demo-client", "demo-secret")
		.base_url(server.base_url())
		.redirect_uri("https://app.example.com/callback")
		.scopes(["contacts"])
		.build()?;
	let config = ClientConfig::new(server.url("/v1"))?
		.with_oauth2(oauth2)
		.with_rate_limit("demo-client", 60);
	let dispatcher =
		RequestDispatcher::builder(config).cache(Arc::new(MemoryCache::default())).build()?;
	let Some(manager) = dispatcher.token_manager() else {
		return Err(color_eyre::eyre::eyre!("OAuth2 credentials were not attached."));
	};
	let authorization = manager.authorization_url(None)?;

	println!("Send the user to {}", authorization.url);

	// The redirect would carry `code` and `state` back to the application.
	let token = manager.exchange_code_for_token("demo-code", &authorization.state)?;

	println!("Token stored: {token:?}");

	let response = dispatcher.send(&ApiRequest::get("contacts").query("page", "1"))?;
	let contacts: Vec<serde_json::Value> = response.json()?;

	println!("Fetched {} contact(s); dispatcher metrics: {:?}", contacts.len(), dispatcher.metrics());

	token_mock.assert();
	api_mock.assert();

	Ok(())
}
