//! Walks through the full three-legged flow: tick the driver until the authorization URL is
//! surfaced, wait for the loopback listener to capture the verifier, and issue a signed call.

// std
use std::{sync::Arc, time::Duration};
// crates.io
use color_eyre::Result;
// self
use oauth1a_driver::{
	auth::Credentials,
	driver::{Driver, DriverConfig, FlowState},
	endpoints::Endpoints,
	listener::{CallbackListener, LoopbackListener},
	store::{CredentialStore, FileStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let store: Arc<dyn CredentialStore> = Arc::new(FileStore::new("demo_credentials.json"));
	let listener: Arc<dyn CallbackListener> = Arc::new(LoopbackListener::new());
	let endpoints = Endpoints::for_api("https://provider.example.com")?;
	let credentials = Credentials::new("demo-consumer-key", "demo-consumer-secret");
	let driver = Driver::new(store, endpoints, credentials)
		.with_config(DriverConfig {
			api_name: "demo-provider".into(),
			application_display_name: Some("oauth1a-driver demo".into()),
			..Default::default()
		})
		.with_listener(listener);
	let mut announced = false;

	loop {
		match driver.tick().await {
			FlowState::Authorized => break,
			FlowState::Failed => {
				eprintln!("Authorization failed; delete demo_credentials.json and retry.");

				return Ok(());
			},
			FlowState::AwaitingVerifierInput if !announced => {
				if let Some(url) = driver.authorization_request_url() {
					println!("Open this URL in a browser and approve the request:\n  {url}");

					announced = true;
				}
			},
			_ => {},
		}

		tokio::time::sleep(Duration::from_millis(250)).await;
	}

	let identity = driver.identity();

	println!("Authorized as {}.", identity.screen_name.as_deref().unwrap_or("<unknown>"));

	let body = driver.get("/v1/account", "format=json").await?;

	println!("Signed call returned {} bytes.", body.len());

	Ok(())
}
