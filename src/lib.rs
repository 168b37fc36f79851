//! Rust’s turnkey OAuth 1.0a client—drive three-legged authorization with a tick-polled state
//! machine, pluggable transports and stores, and loopback verifier capture in one crate built for
//! production.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod driver;
pub mod endpoints;
pub mod error;
pub mod exchange;
pub mod http;
pub mod listener;
pub mod obs;
pub mod signer;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::Credentials,
		driver::Driver,
		endpoints::Endpoints,
		http::ReqwestTransport,
		store::{CredentialStore, MemoryStore},
	};

	/// Constructs a [`Driver`] backed by an in-memory store and the reqwest transport used across
	/// integration tests.
	pub fn build_reqwest_test_driver(
		api_url: &str,
		consumer_key: &str,
		consumer_secret: &str,
	) -> (Driver<ReqwestTransport>, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn CredentialStore> = store_backend.clone();
		let endpoints =
			Endpoints::for_api(api_url).expect("Failed to parse API base URL for tests.");
		let driver = Driver::new(store, endpoints, Credentials::new(consumer_key, consumer_secret));

		(driver, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
