//! Verifier capture for the authorization redirect.
//!
//! The driver never touches sockets directly: it starts a [`CallbackListener`]
//! when a flow begins, advertises the listener's URL as `oauth_callback`, and
//! drains the shared [`VerifierSlot`] on every tick. The listener side stores
//! exactly one [`VerifierNotice`] when the provider redirects the user back.

// std
#[cfg(feature = "listener")]
use std::{net::SocketAddr, path::PathBuf};
// crates.io
#[cfg(feature = "listener")]
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::{TcpListener, TcpStream},
	task::JoinHandle,
};
// self
use crate::_prelude::*;

/// Token/verifier pair captured from the provider's redirect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifierNotice {
	/// Request token echoed back by the provider.
	pub token: String,
	/// One-time verifier granted by the user's consent.
	pub verifier: String,
}

/// Thread-safe slot for handing a captured verifier from the listener task to
/// the driver's tick.
///
/// The driver creates one slot per flow and drains it with
/// [`take`](VerifierSlot::take) at the top of each tick; the listener stores
/// at most one notice. A second store before the drain overwrites the first,
/// which matches the single-redirect contract.
#[derive(Clone, Debug, Default)]
pub struct VerifierSlot(Arc<Mutex<Option<VerifierNotice>>>);
impl VerifierSlot {
	/// Stores a captured notice for the next tick.
	pub fn store(&self, notice: VerifierNotice) {
		*self.0.lock() = Some(notice);
	}

	/// Returns the captured notice, if any, consuming it from the slot.
	pub fn take(&self) -> Option<VerifierNotice> {
		self.0.lock().take()
	}
}

/// Boxed future returned by [`CallbackListener`] methods.
pub type ListenerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Contract for the local redirect-capture collaborator.
///
/// `start` binds a fresh endpoint and returns the URL the provider should
/// redirect to; implementations must be restartable after `stop`.
pub trait CallbackListener
where
	Self: Send + Sync,
{
	/// Binds the listener and returns its reachable callback URL. Captured
	/// verifiers are delivered through `slot`.
	fn start(&self, slot: VerifierSlot) -> ListenerFuture<'_, Url>;

	/// Stops the listener and releases its port. Idempotent.
	fn stop(&self) -> ListenerFuture<'_, ()>;
}

#[cfg(feature = "listener")]
const DEFAULT_LANDING_PAGE: &str = "<!DOCTYPE html>\n<html><head><title>Authorization complete</title></head>\n<body><p>Authorization received. You can close this window and return to the application.</p></body></html>\n";

/// Loopback HTTP listener that captures the one expected redirect.
///
/// Binds an ephemeral port on `127.0.0.1`, answers the redirect with a small
/// landing page (a caller-supplied HTML file, or a built-in default), and
/// stores the extracted `oauth_token`/`oauth_verifier` pair in the slot.
#[cfg(feature = "listener")]
#[derive(Debug, Default)]
pub struct LoopbackListener {
	landing_page: Option<PathBuf>,
	accept_task: Mutex<Option<JoinHandle<()>>>,
}
#[cfg(feature = "listener")]
impl LoopbackListener {
	/// Creates a listener serving the built-in landing page.
	pub fn new() -> Self {
		Self::default()
	}

	/// Serves the provided HTML file to the redirected user instead of the
	/// built-in page. Read once per `start`.
	pub fn with_landing_page(mut self, path: impl Into<PathBuf>) -> Self {
		self.landing_page = Some(path.into());

		self
	}

	async fn accept_loop(listener: TcpListener, slot: VerifierSlot, page: String) {
		loop {
			let (stream, peer) = match listener.accept().await {
				Ok(accepted) => accepted,
				Err(e) => {
					tracing::warn!("Callback listener failed to accept a connection: {e}.");

					continue;
				},
			};

			match Self::handle_redirect(stream, &page).await {
				Ok(Some(notice)) => {
					tracing::debug!("Captured verifier redirect from {peer}.");
					slot.store(notice);

					// One redirect is expected per flow; keep serving in case
					// the browser retries, the slot simply gets overwritten.
				},
				Ok(None) =>
					tracing::debug!("Ignored a request without verifier parameters from {peer}."),
				Err(e) => tracing::warn!("Callback listener failed to serve {peer}: {e}."),
			}
		}
	}

	async fn handle_redirect(
		mut stream: TcpStream,
		page: &str,
	) -> std::io::Result<Option<VerifierNotice>> {
		let mut buffer = vec![0_u8; 8 * 1024];
		let read = stream.read(&mut buffer).await?;
		let request = String::from_utf8_lossy(&buffer[..read]);
		let notice = parse_request_line(&request);
		let response = format!(
			"HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{page}",
			page.len(),
		);

		stream.write_all(response.as_bytes()).await?;
		stream.shutdown().await?;

		Ok(notice)
	}

	async fn landing_page(&self) -> String {
		match &self.landing_page {
			Some(path) => match tokio::fs::read_to_string(path).await {
				Ok(page) => page,
				Err(e) => {
					tracing::warn!(
						"Failed to read landing page {}: {e}; using the built-in page.",
						path.display(),
					);

					DEFAULT_LANDING_PAGE.to_owned()
				},
			},
			None => DEFAULT_LANDING_PAGE.to_owned(),
		}
	}
}
#[cfg(feature = "listener")]
impl CallbackListener for LoopbackListener {
	fn start(&self, slot: VerifierSlot) -> ListenerFuture<'_, Url> {
		Box::pin(async move {
			let listener = TcpListener::bind(("127.0.0.1", 0))
				.await
				.map_err(crate::error::TransportError::Io)?;
			let addr: SocketAddr =
				listener.local_addr().map_err(crate::error::TransportError::Io)?;
			let url = Url::parse(&format!("http://{addr}/")).map_err(|source| {
				crate::error::ConfigError::InvalidUrl { url: format!("http://{addr}/"), source }
			})?;
			let page = self.landing_page().await;
			let task = tokio::spawn(Self::accept_loop(listener, slot, page));
			let mut guard = self.accept_task.lock();

			if let Some(previous) = guard.replace(task) {
				previous.abort();
			}

			tracing::info!("Verifier callback listener bound at {url}.");

			Ok(url)
		})
	}

	fn stop(&self) -> ListenerFuture<'_, ()> {
		Box::pin(async move {
			if let Some(task) = self.accept_task.lock().take() {
				task.abort();

				tracing::info!("Verifier callback listener stopped.");
			}

			Ok(())
		})
	}
}

/// Extracts `oauth_token` and `oauth_verifier` from an HTTP request line.
#[cfg(any(test, feature = "listener"))]
fn parse_request_line(request: &str) -> Option<VerifierNotice> {
	let line = request.lines().next()?;
	let target = line.split_whitespace().nth(1)?;
	let url = Url::parse(&format!("http://localhost{target}")).ok()?;
	let mut token = None;
	let mut verifier = None;

	for (key, value) in url.query_pairs() {
		match key.as_ref() {
			"oauth_token" => token = Some(value.into_owned()),
			"oauth_verifier" => verifier = Some(value.into_owned()),
			_ => {},
		}
	}

	Some(VerifierNotice { token: token?, verifier: verifier? })
}
