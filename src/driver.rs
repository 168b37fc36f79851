//! Tick-driven authorization state machine.
//!
//! [`Driver::tick`] advances the three-legged flow one step at a time: load
//! persisted credentials on the first tick, acquire a request token, surface
//! the user-authorization URL exactly once, wait for the verifier (from the
//! callback listener or out-of-band input), exchange it for an access token,
//! and settle in [`FlowState::Authorized`]. Failures latch the session into
//! the absorbing [`FlowState::Failed`] and are reported exactly once;
//! clearing them requires [`Driver::reset`] or fresh credentials.

// self
use crate::{
	_prelude::*,
	auth::{Credentials, Identity, TokenSecret},
	endpoints::Endpoints,
	error::ConfigError,
	http::OAuthTransport,
	listener::{CallbackListener, VerifierSlot},
	signer::{self, HttpMethod, SignContext, SigningMethod},
	store::{CredentialStore, StoredCredentials},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

/// Observable flow states, derived from the session fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowState {
	/// No tick has run yet; persisted credentials are still unloaded.
	Idle,
	/// No request token on record; the next tick will ask for one.
	AwaitingRequestToken,
	/// Request token on record; the authorization URL has not been surfaced.
	AwaitingUserVerification,
	/// Authorization URL surfaced; waiting for the verifier to arrive.
	AwaitingVerifierInput,
	/// Verifier on record; the next tick will exchange it.
	ExchangingAccessToken,
	/// Access token and secret are both present. Stable.
	Authorized,
	/// The failure latch is set. Absorbing; requires external intervention.
	Failed,
}

/// Static driver configuration beyond credentials and endpoints.
#[derive(Clone, Debug)]
pub struct DriverConfig {
	/// Label written to the credential document.
	pub api_name: String,
	/// Signature method for every signed request.
	pub signing_method: SigningMethod,
	/// HTTP method used for the token-exchange legs.
	pub http_method: HttpMethod,
	/// Unsigned realm injected into Authorization headers.
	pub realm: Option<String>,
	/// `xoauth_displayname` sent with the request-token leg.
	pub application_display_name: Option<String>,
	/// `scope` sent with the request-token leg (provider-specific).
	pub application_scope: Option<String>,
	/// Extra query fragment appended to the user-authorization URL.
	pub authorization_params: String,
	/// PEM private key for RSA-SHA1 signing.
	pub rsa_private_key: Option<String>,
}
impl Default for DriverConfig {
	fn default() -> Self {
		Self {
			api_name: "GENERIC".into(),
			signing_method: SigningMethod::default(),
			http_method: HttpMethod::default(),
			realm: None,
			application_display_name: None,
			application_scope: None,
			authorization_params: String::new(),
			rsa_private_key: None,
		}
	}
}

/// Session state shared between ticks and concurrent verifier delivery.
#[derive(Debug)]
pub(crate) struct Session {
	pub(crate) credentials: Credentials,
	pub(crate) identity: Identity,
	pub(crate) callback_confirmed: bool,
	pub(crate) verification_requested: bool,
	pub(crate) failure: Option<String>,
	pub(crate) failure_reported: bool,
	pub(crate) first_tick: bool,
	pub(crate) callback_url: Option<Url>,
	pub(crate) listener_running: bool,
	pub(crate) authorization_request: Option<String>,
}
impl Session {
	fn new(credentials: Credentials) -> Self {
		Self {
			credentials,
			identity: Identity::default(),
			callback_confirmed: false,
			verification_requested: false,
			failure: None,
			failure_reported: false,
			first_tick: true,
			callback_url: None,
			listener_running: false,
			authorization_request: None,
		}
	}

	/// Sets the sticky failure latch; the first reason wins.
	pub(crate) fn latch_failure(&mut self, reason: impl Display) {
		if self.failure.is_none() {
			self.failure = Some(reason.to_string());
		}
	}
}

/// Coordinates the three-legged flow against a single provider.
///
/// The driver owns the transport, credential store, endpoint set, and an
/// optional callback listener; all mutable state lives in one mutex-guarded
/// session so a tick and a concurrent verifier delivery never race. Ticks
/// themselves are serialized by an internal async guard, making `tick` safe
/// to call from an impatient poll loop.
pub struct Driver<T>
where
	T: ?Sized + OAuthTransport,
{
	/// HTTP transport used for every signed request.
	pub transport: Arc<T>,
	/// Store that persists credentials after a successful exchange.
	pub store: Arc<dyn CredentialStore>,
	/// Provider endpoint set.
	pub endpoints: Endpoints,
	/// Static configuration.
	pub config: DriverConfig,
	listener: Option<Arc<dyn CallbackListener>>,
	pub(crate) session: Mutex<Session>,
	verifier_slot: VerifierSlot,
	tick_guard: AsyncMutex<()>,
}
impl<T> Driver<T>
where
	T: ?Sized + OAuthTransport,
{
	/// Creates a driver that reuses the caller-provided transport.
	pub fn with_transport(
		store: Arc<dyn CredentialStore>,
		endpoints: Endpoints,
		credentials: Credentials,
		transport: impl Into<Arc<T>>,
	) -> Self {
		Self {
			transport: transport.into(),
			store,
			endpoints,
			config: DriverConfig::default(),
			listener: None,
			session: Mutex::new(Session::new(credentials)),
			verifier_slot: VerifierSlot::default(),
			tick_guard: AsyncMutex::new(()),
		}
	}

	/// Replaces the static configuration.
	pub fn with_config(mut self, config: DriverConfig) -> Self {
		self.config = config;

		self
	}

	/// Attaches a callback listener, enabling verifier capture via redirect.
	/// Without one the driver expects out-of-band verifier input through
	/// [`Driver::set_verifier_received`].
	pub fn with_listener(mut self, listener: Arc<dyn CallbackListener>) -> Self {
		self.listener = Some(listener);

		self
	}

	/// Current flow state.
	pub fn state(&self) -> FlowState {
		Self::state_of(&self.session.lock())
	}

	/// Whether the access token and secret are both on record.
	pub fn is_authorized(&self) -> bool {
		self.session.lock().credentials.is_authorized()
	}

	/// Snapshot of the credential state.
	pub fn credentials(&self) -> Credentials {
		self.session.lock().credentials.clone()
	}

	/// Snapshot of the identity fields.
	pub fn identity(&self) -> Identity {
		self.session.lock().identity.clone()
	}

	/// Whether the provider confirmed the callback URL.
	pub fn callback_confirmed(&self) -> bool {
		self.session.lock().callback_confirmed
	}

	/// The authorization URL surfaced for the user, once one exists.
	pub fn authorization_request_url(&self) -> Option<String> {
		self.session.lock().authorization_request.clone()
	}

	/// Advances the flow by at most one step. Idempotent: calling it again
	/// while nothing is ready makes no progress and no network calls.
	pub async fn tick(&self) -> FlowState {
		let _serial = self.tick_guard.lock().await;

		if self.session.lock().first_tick {
			self.load_persisted_credentials().await;
			self.session.lock().first_tick = false;
		}

		// Concurrent callback deliveries land in the slot; apply them before
		// deciding what to do. Mismatches are rejected inside.
		if let Some(notice) = self.verifier_slot.take() {
			let _ = self.set_verifier_received(&notice.token, &notice.verifier);
		}

		match self.decide() {
			TickAction::ReportFailure(reason) => {
				tracing::error!("Authorization failed: {reason}.");
			},
			TickAction::Settled => {},
			TickAction::StopListener => self.stop_listener().await,
			TickAction::AcquireRequestToken { start_listener } => {
				if start_listener {
					self.start_listener().await;
				} else if self.listener.is_none() {
					tracing::debug!(
						"Callback listener disabled; expecting out-of-band verifier input. \
						Call `set_verifier_received` with the verification code to continue.",
					);
				}

				if let Err(e) = self.obtain_request_token().await {
					self.session.lock().latch_failure(&e);
				}
			},
			TickAction::RequestUserVerification => match self.request_user_verification() {
				Ok(url) => {
					let mut session = self.session.lock();

					session.authorization_request = Some(url.clone());
					session.verification_requested = true;

					drop(session);
					tracing::info!("User verification required; direct the user to {url}.");
				},
				Err(e) => self.session.lock().latch_failure(&e),
			},
			TickAction::AwaitVerifier => {
				tracing::debug!(
					"Waiting for the request-token verifier; it arrives via the callback \
					listener or `set_verifier_received`.",
				);
			},
			TickAction::ExchangeAccessToken => {
				self.stop_listener().await;
				self.session.lock().verification_requested = false;

				if let Err(e) = self.obtain_access_token().await {
					self.session.lock().latch_failure(&e);
				}
			},
		}

		self.state()
	}

	/// Applies a verifier delivered for `request_token`.
	///
	/// The verifier is only accepted when the supplied request token matches
	/// the one on record; anything else is a stale or cross-session callback
	/// and is rejected without touching the session.
	pub fn set_verifier_received(&self, request_token: &str, verifier: &str) -> Result<()> {
		let mut session = self.session.lock();

		if session.credentials.request_token.as_deref() == Some(request_token)
			&& !request_token.is_empty()
		{
			session.credentials.request_token_verifier = Some(verifier.to_owned());

			Ok(())
		} else {
			tracing::error!(
				"Verifier rejected: request token `{request_token}` does not match the one on record.",
			);

			Err(Error::VerifierMismatch { delivered: request_token.to_owned() })
		}
	}

	/// Builds the user-authorization URL for the current request token.
	pub fn request_user_verification(&self) -> Result<String> {
		let session = self.session.lock();
		let token = session
			.credentials
			.request_token
			.as_deref()
			.filter(|token| !token.is_empty())
			.ok_or(ConfigError::Missing { field: "request_token" })?;

		Ok(format!(
			"{}oauth_token={}{}",
			self.endpoints.authorization(),
			signer::encode(token),
			self.config.authorization_params,
		))
	}

	/// Clears session state back to a fresh flow, keeping the consumer pair.
	/// The one way out of [`FlowState::Failed`] short of a new driver.
	pub fn reset(&self) {
		let mut session = self.session.lock();
		let consumer_key = session.credentials.consumer_key.clone();
		let consumer_secret = session.credentials.consumer_secret.clone();

		*session = Session::new(Credentials {
			consumer_key,
			consumer_secret,
			..Default::default()
		});
		session.first_tick = false;
	}

	/// Issues an authorized, signed GET against `api_url + uri + "?" + query`.
	pub async fn get(&self, uri: &str, query: &str) -> Result<String> {
		let signed = self.sign_api_call(uri, query, HttpMethod::Get)?;

		Ok(self.transport.get(&signed.url, &signed.authorization).await?)
	}

	/// Issues an authorized, signed POST; non-`oauth_` parameters travel as
	/// an `application/x-www-form-urlencoded` body.
	pub async fn post(&self, uri: &str, query: &str) -> Result<String> {
		let signed = self.sign_api_call(uri, query, HttpMethod::Post)?;

		Ok(self.transport.post(&signed.base_url, &signed.authorization, &signed.form_body).await?)
	}

	pub(crate) fn consumer_pair(&self) -> (String, String) {
		let session = self.session.lock();

		(
			session.credentials.consumer_key.clone(),
			session.credentials.consumer_secret.expose().to_owned(),
		)
	}

	pub(crate) fn stored_credentials(&self, session: &Session) -> StoredCredentials {
		StoredCredentials {
			api_name: self.config.api_name.clone(),
			access_token: session.credentials.access_token.clone().unwrap_or_default(),
			access_secret: session
				.credentials
				.access_token_secret
				.as_ref()
				.map(|s| s.expose().to_owned())
				.unwrap_or_default(),
			screen_name: session.identity.screen_name.clone().unwrap_or_default(),
			user_id: session.identity.user_id.clone().unwrap_or_default(),
			user_id_encoded: session.identity.encoded_user_id.clone().unwrap_or_default(),
			user_password: session.identity.user_password.clone().unwrap_or_default(),
			user_password_encoded: session
				.identity
				.encoded_user_password
				.clone()
				.unwrap_or_default(),
		}
	}

	fn state_of(session: &Session) -> FlowState {
		if session.failure.is_some() {
			FlowState::Failed
		} else if session.credentials.is_authorized() {
			FlowState::Authorized
		} else if session.first_tick {
			FlowState::Idle
		} else if session.credentials.request_token_verifier.is_some() {
			FlowState::ExchangingAccessToken
		} else if session.credentials.request_token.is_some() {
			if session.verification_requested {
				FlowState::AwaitingVerifierInput
			} else {
				FlowState::AwaitingUserVerification
			}
		} else {
			FlowState::AwaitingRequestToken
		}
	}

	fn decide(&self) -> TickAction {
		let mut session = self.session.lock();

		if let Some(reason) = &session.failure {
			return if session.failure_reported {
				TickAction::Settled
			} else {
				let reason = reason.clone();

				session.failure_reported = true;

				TickAction::ReportFailure(reason)
			};
		}
		if session.credentials.is_authorized() {
			return if session.listener_running { TickAction::StopListener } else { TickAction::Settled };
		}
		if session.credentials.request_token_verifier.is_none() {
			if session.credentials.request_token.is_none() {
				let start_listener = self.listener.is_some() && !session.listener_running;

				return TickAction::AcquireRequestToken { start_listener };
			}

			return if session.verification_requested {
				TickAction::AwaitVerifier
			} else {
				TickAction::RequestUserVerification
			};
		}

		TickAction::ExchangeAccessToken
	}

	async fn load_persisted_credentials(&self) {
		match self.store.load().await {
			Ok(Some(document)) => {
				let mut session = self.session.lock();

				if !document.is_authorized() {
					tracing::warn!(
						"Found a credential document, but access token or secret was empty.",
					);
				}
				if !document.access_token.is_empty() {
					session.credentials.access_token = Some(document.access_token);
				}
				if !document.access_secret.is_empty() {
					session.credentials.access_token_secret =
						Some(TokenSecret::new(document.access_secret));
				}

				session.identity = Identity {
					screen_name: some_nonempty(document.screen_name),
					user_id: some_nonempty(document.user_id),
					encoded_user_id: some_nonempty(document.user_id_encoded),
					user_password: some_nonempty(document.user_password),
					encoded_user_password: some_nonempty(document.user_password_encoded),
				};
			},
			Ok(None) =>
				tracing::info!("No persisted credentials found; starting a fresh authorization."),
			Err(e) => tracing::warn!("Failed to load persisted credentials: {e}."),
		}
	}

	async fn start_listener(&self) {
		let Some(listener) = &self.listener else { return };

		match listener.start(self.verifier_slot.clone()).await {
			Ok(url) => {
				let mut session = self.session.lock();

				session.callback_url = Some(url);
				session.listener_running = true;
			},
			Err(e) => tracing::warn!(
				"Failed to start the callback listener: {e}; continuing without a callback URL.",
			),
		}
	}

	async fn stop_listener(&self) {
		let running = {
			let mut session = self.session.lock();
			let running = session.listener_running;

			session.listener_running = false;
			session.callback_url = None;

			running
		};

		if running
			&& let Some(listener) = &self.listener
			&& let Err(e) = listener.stop().await
		{
			tracing::warn!("Failed to stop the callback listener: {e}.");
		}
	}

	fn sign_api_call(
		&self,
		uri: &str,
		query: &str,
		method: HttpMethod,
	) -> Result<signer::SignedRequest> {
		let (consumer_key, consumer_secret, access_token, access_token_secret) = {
			let session = self.session.lock();
			let credentials = &session.credentials;

			if credentials.consumer_key.is_empty() {
				return Err(ConfigError::Missing { field: "consumer_key" }.into());
			}
			if credentials.consumer_secret.is_empty() {
				return Err(ConfigError::Missing { field: "consumer_secret" }.into());
			}

			let access_token = credentials
				.access_token
				.clone()
				.filter(|token| !token.is_empty())
				.ok_or(ConfigError::Missing { field: "access_token" })?;
			let access_token_secret = credentials
				.access_token_secret
				.clone()
				.filter(|secret| !secret.is_empty())
				.ok_or(ConfigError::Missing { field: "access_token_secret" })?;

			(
				credentials.consumer_key.clone(),
				credentials.consumer_secret.expose().to_owned(),
				access_token,
				access_token_secret,
			)
		};
		let url = format!("{}{uri}?{query}", self.endpoints.api());
		let ctx = SignContext {
			signing_method: self.config.signing_method,
			http_method: method,
			consumer_key: &consumer_key,
			consumer_secret: &consumer_secret,
			token: Some(&access_token),
			token_secret: Some(access_token_secret.expose()),
			realm: self.config.realm.as_deref(),
			rsa_private_key: self.config.rsa_private_key.as_deref(),
		};

		Ok(signer::sign(&url, &[], &ctx)?)
	}
}
#[cfg(feature = "reqwest")]
impl Driver<ReqwestTransport> {
	/// Creates a driver with a default reqwest transport.
	pub fn new(
		store: Arc<dyn CredentialStore>,
		endpoints: Endpoints,
		credentials: Credentials,
	) -> Self {
		Self::with_transport(store, endpoints, credentials, ReqwestTransport::default())
	}
}
impl<T> Debug for Driver<T>
where
	T: ?Sized + OAuthTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let session = self.session.lock();

		f.debug_struct("Driver")
			.field("endpoints", &self.endpoints)
			.field("state", &Self::state_of(&session))
			.field("listener_attached", &self.listener.is_some())
			.finish()
	}
}

enum TickAction {
	ReportFailure(String),
	Settled,
	StopListener,
	AcquireRequestToken { start_listener: bool },
	RequestUserVerification,
	AwaitVerifier,
	ExchangeAccessToken,
}

fn some_nonempty(value: String) -> Option<String> {
	if value.is_empty() { None } else { Some(value) }
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::MemoryStore;

	struct NoTransport;
	impl OAuthTransport for NoTransport {
		fn get<'a>(
			&'a self,
			_: &'a str,
			_: &'a str,
		) -> crate::http::TransportFuture<'a, String> {
			Box::pin(async { panic!("No network call expected.") })
		}

		fn post<'a>(
			&'a self,
			_: &'a str,
			_: &'a str,
			_: &'a str,
		) -> crate::http::TransportFuture<'a, String> {
			Box::pin(async { panic!("No network call expected.") })
		}
	}

	fn build_driver(credentials: Credentials) -> Driver<NoTransport> {
		let endpoints =
			Endpoints::for_api("https://api.example.com").expect("Endpoint fixture should parse.");

		Driver::with_transport(Arc::new(MemoryStore::default()), endpoints, credentials, NoTransport)
	}

	#[test]
	fn verifier_is_rejected_for_a_stale_request_token() {
		let driver = build_driver(Credentials::new("key", "secret"));

		driver.session.lock().credentials.request_token = Some("T2".into());

		let result = driver.set_verifier_received("T1", "V1");

		assert!(matches!(result, Err(Error::VerifierMismatch { .. })));
		assert_eq!(driver.credentials().request_token_verifier, None);

		driver
			.set_verifier_received("T2", "V1")
			.expect("Matching request token should accept the verifier.");

		assert_eq!(driver.credentials().request_token_verifier.as_deref(), Some("V1"));
	}

	#[test]
	fn state_derivation_follows_the_session_fields() {
		let driver = build_driver(Credentials::new("key", "secret"));

		assert_eq!(driver.state(), FlowState::Idle);

		{
			let mut session = driver.session.lock();

			session.first_tick = false;
		}

		assert_eq!(driver.state(), FlowState::AwaitingRequestToken);

		driver.session.lock().credentials.request_token = Some("T1".into());

		assert_eq!(driver.state(), FlowState::AwaitingUserVerification);

		driver.session.lock().verification_requested = true;

		assert_eq!(driver.state(), FlowState::AwaitingVerifierInput);

		driver.session.lock().credentials.request_token_verifier = Some("V1".into());

		assert_eq!(driver.state(), FlowState::ExchangingAccessToken);

		{
			let mut session = driver.session.lock();

			session.credentials.access_token = Some("A1".into());
			session.credentials.access_token_secret = Some(TokenSecret::new("AS1"));
		}

		assert_eq!(driver.state(), FlowState::Authorized);

		driver.session.lock().latch_failure("boom");

		assert_eq!(driver.state(), FlowState::Failed);

		driver.reset();

		assert_eq!(driver.state(), FlowState::AwaitingRequestToken);
		assert_eq!(driver.credentials().consumer_key, "key");
	}

	#[test]
	fn authorized_call_preconditions_fail_fast() {
		let driver = build_driver(Credentials::new("key", "secret"));
		let result = driver.sign_api_call("/v1/resource", "a=b", HttpMethod::Get);

		assert!(matches!(
			result,
			Err(Error::Config(ConfigError::Missing { field: "access_token" }))
		));

		let driver = build_driver(Credentials::new("", "secret"));
		let result = driver.sign_api_call("/v1/resource", "a=b", HttpMethod::Get);

		assert!(matches!(
			result,
			Err(Error::Config(ConfigError::Missing { field: "consumer_key" }))
		));
	}

	#[test]
	fn authorization_url_carries_the_request_token() {
		let driver = build_driver(Credentials::new("key", "secret"));

		assert!(matches!(
			driver.request_user_verification(),
			Err(Error::Config(ConfigError::Missing { field: "request_token" }))
		));

		driver.session.lock().credentials.request_token = Some("T1".into());

		assert_eq!(
			driver.request_user_verification().expect("URL should build."),
			"https://api.example.com/oauth/authorize?oauth_token=T1",
		);
	}
}
