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
	http::ReqwestTransport,
	store::{CredentialStore, MemoryStore},
};

const CONSUMER_KEY: &str = "consumer-it";
const CONSUMER_SECRET: &str = "secret-it";

fn build_driver(server: &MockServer) -> (Driver<ReqwestTransport>, Arc<MemoryStore>) {
	build_driver_with_credentials(server, Credentials::new(CONSUMER_KEY, CONSUMER_SECRET))
}

fn build_driver_with_credentials(
	server: &MockServer,
	credentials: Credentials,
) -> (Driver<ReqwestTransport>, Arc<MemoryStore>) {
	let store_backend = Arc::new(MemoryStore::default());
	let store: Arc<dyn CredentialStore> = store_backend.clone();
	let endpoints = Endpoints::for_api(server.base_url())
		.expect("Mock server base URL should parse successfully.");

	(Driver::new(store, endpoints, credentials), store_backend)
}

#[tokio::test]
async fn three_legged_flow_reaches_authorized_and_persists_once() {
	let server = MockServer::start_async().await;
	let request_token_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/oauth/request_token")
				.query_param("oauth_consumer_key", CONSUMER_KEY)
				.query_param("oauth_signature_method", "HMAC-SHA1")
				.query_param_exists("oauth_signature")
				.query_param_exists("oauth_nonce")
				.query_param_exists("oauth_timestamp");
			then.status(200).body("oauth_token=T1&oauth_token_secret=S1&oauth_callback_confirmed=true");
		})
		.await;
	let access_token_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/oauth/access_token")
				.query_param("oauth_token", "T1")
				.query_param("oauth_verifier", "V1")
				.query_param_exists("oauth_signature");
			then.status(200).body(
				"oauth_token=A1&oauth_token_secret=AS1&screen_name=alice&user_id=42&encoded_user_id=ZW5j",
			);
		})
		.await;
	let (driver, store) = build_driver(&server);

	assert_eq!(driver.state(), FlowState::Idle);
	assert_eq!(driver.tick().await, FlowState::AwaitingUserVerification);
	assert!(driver.callback_confirmed());
	assert_eq!(driver.tick().await, FlowState::AwaitingVerifierInput);
	assert_eq!(
		driver.authorization_request_url().expect("Authorization URL should be surfaced."),
		format!("{}/oauth/authorize?oauth_token=T1", server.base_url()),
	);
	// Waiting ticks make no progress and no network calls.
	assert_eq!(driver.tick().await, FlowState::AwaitingVerifierInput);
	request_token_mock.assert_hits_async(1).await;

	driver
		.set_verifier_received("T1", "V1")
		.expect("Verifier for the recorded request token should be accepted.");

	assert_eq!(driver.state(), FlowState::ExchangingAccessToken);
	assert_eq!(driver.tick().await, FlowState::Authorized);

	let credentials = driver.credentials();

	assert_eq!(credentials.access_token.as_deref(), Some("A1"));
	assert!(credentials.request_token.is_none());

	let identity = driver.identity();

	assert_eq!(identity.screen_name.as_deref(), Some("alice"));
	assert_eq!(identity.user_id.as_deref(), Some("42"));
	assert_eq!(identity.encoded_user_id.as_deref(), Some("ZW5j"));

	let document = store.document().expect("Credentials should be persisted.");

	assert_eq!(document.access_token, "A1");
	assert_eq!(document.access_secret, "AS1");
	assert_eq!(store.saves(), 1);

	// Further ticks settle without touching the network or the store again.
	assert_eq!(driver.tick().await, FlowState::Authorized);
	assert_eq!(driver.tick().await, FlowState::Authorized);
	request_token_mock.assert_hits_async(1).await;
	access_token_mock.assert_hits_async(1).await;
	assert_eq!(store.saves(), 1);
}

#[tokio::test]
async fn incomplete_request_token_reply_latches_failure() {
	let server = MockServer::start_async().await;
	let request_token_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/oauth/request_token");
			then.status(200).body("oauth_token=T1");
		})
		.await;
	let (driver, store) = build_driver(&server);

	assert_eq!(driver.tick().await, FlowState::Failed);
	// The failure is absorbing; later ticks stay failed without retrying.
	assert_eq!(driver.tick().await, FlowState::Failed);
	assert_eq!(driver.tick().await, FlowState::Failed);
	request_token_mock.assert_hits_async(1).await;
	assert_eq!(store.saves(), 0);
}

#[tokio::test]
async fn provider_problem_reply_latches_failure() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/oauth/request_token");
			then.status(200).body("oauth_problem=consumer_key_rejected");
		})
		.await;

	let (driver, _) = build_driver(&server);

	assert_eq!(driver.tick().await, FlowState::Failed);
}

#[tokio::test]
async fn provider_problem_with_complete_tokens_still_fails() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/oauth/request_token");
			then.status(200)
				.body("oauth_token=T1&oauth_token_secret=S1&oauth_problem=token_rejected");
		})
		.await;

	let (driver, store) = build_driver(&server);

	assert_eq!(driver.tick().await, FlowState::Failed);
	assert_eq!(store.saves(), 0);
}

#[tokio::test]
async fn access_reply_with_a_problem_is_never_persisted() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/oauth/request_token");
			then.status(200).body("oauth_token=T1&oauth_token_secret=S1");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/oauth/access_token");
			then.status(200)
				.body("oauth_token=A1&oauth_token_secret=AS1&oauth_problem=token_expired");
		})
		.await;

	let (driver, store) = build_driver(&server);

	assert_eq!(driver.tick().await, FlowState::AwaitingUserVerification);
	assert_eq!(driver.tick().await, FlowState::AwaitingVerifierInput);
	driver
		.set_verifier_received("T1", "V1")
		.expect("Verifier for the recorded request token should be accepted.");
	assert_eq!(driver.tick().await, FlowState::Failed);
	assert_eq!(store.saves(), 0);
}

#[tokio::test]
async fn missing_consumer_key_fails_without_a_network_call() {
	let server = MockServer::start_async().await;
	let request_token_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/oauth/request_token");
			then.status(200).body("oauth_token=T1&oauth_token_secret=S1");
		})
		.await;
	let (driver, _) = build_driver_with_credentials(&server, Credentials::new("", CONSUMER_SECRET));

	assert_eq!(driver.tick().await, FlowState::Failed);
	request_token_mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn missing_consumer_secret_fails_without_a_network_call() {
	// An empty endpoint URL is the third precondition, but `Endpoints` cannot
	// be constructed with one, so only the credential halves are reachable.
	let server = MockServer::start_async().await;
	let request_token_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/oauth/request_token");
			then.status(200).body("oauth_token=T1&oauth_token_secret=S1");
		})
		.await;
	let (driver, _) = build_driver_with_credentials(&server, Credentials::new(CONSUMER_KEY, ""));

	assert_eq!(driver.tick().await, FlowState::Failed);
	request_token_mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn reset_clears_a_latched_failure() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(GET).path("/oauth/request_token");
			then.status(200).body("oauth_token=T1");
		})
		.await;

	let (driver, _) = build_driver(&server);

	assert_eq!(driver.tick().await, FlowState::Failed);

	driver.reset();

	assert_eq!(driver.state(), FlowState::AwaitingRequestToken);
	assert_eq!(driver.credentials().consumer_key, CONSUMER_KEY);
}
