#![cfg(feature = "reqwest")]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
// self
use oauth1a_driver::{
	auth::Credentials,
	driver::{Driver, FlowState},
	endpoints::Endpoints,
	error::{ConfigError, Error},
	http::ReqwestTransport,
	store::{CredentialStore, MemoryStore, StoredCredentials},
};

fn persisted_document() -> StoredCredentials {
	StoredCredentials {
		api_name: "GENERIC".into(),
		access_token: "A1".into(),
		access_secret: "AS1".into(),
		screen_name: "alice".into(),
		..Default::default()
	}
}

fn build_driver(server: &MockServer, store: Arc<MemoryStore>) -> Driver<ReqwestTransport> {
	let store: Arc<dyn CredentialStore> = store;
	let endpoints = Endpoints::for_api(server.base_url())
		.expect("Mock server base URL should parse successfully.");

	Driver::new(store, endpoints, Credentials::new("consumer-it", "secret-it"))
}

#[tokio::test]
async fn persisted_credentials_skip_the_token_exchange() {
	let server = MockServer::start_async().await;
	let store = Arc::new(MemoryStore::with_document(persisted_document()));
	let driver = build_driver(&server, store.clone());

	assert_eq!(driver.tick().await, FlowState::Authorized);
	assert!(driver.is_authorized());
	assert_eq!(driver.identity().screen_name.as_deref(), Some("alice"));
	// Loading never writes back.
	assert_eq!(store.saves(), 0);
}

#[tokio::test]
async fn authorized_get_signs_the_query() {
	let server = MockServer::start_async().await;
	let resource_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v1/resource")
				.query_param("format", "json")
				.query_param("oauth_token", "A1")
				.query_param_exists("oauth_signature");
			then.status(200).body("{\"ok\":true}");
		})
		.await;
	let store = Arc::new(MemoryStore::with_document(persisted_document()));
	let driver = build_driver(&server, store);

	driver.tick().await;

	let body = driver
		.get("/v1/resource", "format=json")
		.await
		.expect("Signed GET should succeed against the mock.");

	assert_eq!(body, "{\"ok\":true}");
	resource_mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn authorized_post_moves_parameters_into_the_body() {
	let server = MockServer::start_async().await;
	let resource_mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/v1/resource")
				.header("content-type", "application/x-www-form-urlencoded")
				.body("status=hello")
				.header_exists("authorization");
			then.status(200).body("created");
		})
		.await;
	let store = Arc::new(MemoryStore::with_document(persisted_document()));
	let driver = build_driver(&server, store);

	driver.tick().await;

	let body = driver
		.post("/v1/resource", "status=hello")
		.await
		.expect("Signed POST should succeed against the mock.");

	assert_eq!(body, "created");
	resource_mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn unauthorized_calls_fail_fast() {
	let server = MockServer::start_async().await;
	let driver = build_driver(&server, Arc::new(MemoryStore::default()));
	let err = driver
		.get("/v1/resource", "format=json")
		.await
		.expect_err("Unauthorized GET should fail before the network.");

	assert!(matches!(err, Error::Config(ConfigError::Missing { field: "access_token" })));
}
