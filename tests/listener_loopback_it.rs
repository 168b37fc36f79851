#![cfg(all(feature = "reqwest", feature = "listener"))]

// self
use oauth1a_driver::listener::{CallbackListener, LoopbackListener, VerifierNotice, VerifierSlot};

#[tokio::test]
async fn loopback_listener_captures_the_redirect() {
	let listener = LoopbackListener::new();
	let slot = VerifierSlot::default();
	let callback = listener
		.start(slot.clone())
		.await
		.expect("Loopback listener should bind an ephemeral port.");

	assert_eq!(callback.host_str(), Some("127.0.0.1"));

	let redirect = format!("{callback}?oauth_token=T1&oauth_verifier=V1");
	let response = oauth1a_driver::reqwest::get(&redirect)
		.await
		.expect("Redirect request should reach the listener.");

	assert_eq!(response.status().as_u16(), 200);
	assert!(
		response
			.text()
			.await
			.expect("Landing page body should be readable.")
			.contains("Authorization complete"),
	);
	assert_eq!(
		slot.take(),
		Some(VerifierNotice { token: "T1".into(), verifier: "V1".into() }),
	);

	listener.stop().await.expect("Stopping the listener should succeed.");
	// Stop is idempotent.
	listener.stop().await.expect("Stopping an already-stopped listener should succeed.");
}

#[tokio::test]
async fn loopback_listener_restarts_on_a_fresh_port() {
	let listener = LoopbackListener::new();
	let slot = VerifierSlot::default();
	let first = listener
		.start(slot.clone())
		.await
		.expect("First start should bind an ephemeral port.");
	let second = listener
		.start(slot.clone())
		.await
		.expect("Restart should bind another ephemeral port.");

	assert_ne!(first.port(), second.port());

	let redirect = format!("{second}?oauth_token=T2&oauth_verifier=V2");

	oauth1a_driver::reqwest::get(&redirect)
		.await
		.expect("Redirect request should reach the restarted listener.");

	assert_eq!(slot.take().map(|notice| notice.verifier), Some("V2".into()));

	listener.stop().await.expect("Stopping the listener should succeed.");
}
