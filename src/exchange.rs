//! Token-acquisition round trips and provider reply parsing.
//!
//! Replies are `&`-separated `key=value` documents. Parsing happens in two
//! stages: the raw body becomes a keyed mapping (malformed pairs are skipped
//! with a warning), then a typed intermediate picks out the fields the flow
//! cares about via case-insensitive dispatch. The full mapping is always
//! returned so callers can inspect provider-specific extras.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	driver::Driver,
	error::{ConfigError, ProtocolError},
	http::OAuthTransport,
	obs::{self, ExchangeKind, ExchangeOutcome},
	signer::{self, SignContext},
};

/// Parses a reply body into its keyed parameters, preserving original keys.
pub fn parse_reply(body: &str) -> BTreeMap<String, String> {
	let mut params = BTreeMap::new();

	for pair in body.split('&').filter(|pair| !pair.is_empty()) {
		let tokens = pair.split('=').collect::<Vec<_>>();

		if let [key, value] = tokens[..] {
			params.insert(key.to_owned(), value.to_owned());
		} else {
			tracing::warn!("Reply parameter `{pair}` did not split into a key/value pair; skipping.");
		}
	}

	params
}

/// Typed view over a request-token reply.
#[derive(Debug, Default)]
pub(crate) struct RequestTokenReply {
	pub token: Option<String>,
	pub token_secret: Option<String>,
	pub callback_confirmed: Option<bool>,
}
impl RequestTokenReply {
	pub(crate) fn from_params(params: &BTreeMap<String, String>) -> Self {
		let mut reply = Self::default();

		for (key, value) in params {
			match key.to_ascii_lowercase().as_str() {
				"oauth_token" => reply.token = Some(value.clone()),
				"oauth_token_secret" => reply.token_secret = Some(value.clone()),
				"oauth_callback_confirmed" => reply.callback_confirmed = Some(parse_bool(value)),
				"oauth_problem" =>
					tracing::error!("Request-token exchange reported an OAuth problem: {value}."),
				_ => tracing::debug!("Request-token reply carried an unknown parameter: {key}={value}."),
			}
		}

		reply
	}
}

/// Typed view over an access-token reply.
#[derive(Debug, Default)]
pub(crate) struct AccessTokenReply {
	pub token: Option<String>,
	pub token_secret: Option<String>,
	pub encoded_user_id: Option<String>,
	pub user_id: Option<String>,
	pub screen_name: Option<String>,
}
impl AccessTokenReply {
	pub(crate) fn from_params(params: &BTreeMap<String, String>) -> Self {
		let mut reply = Self::default();

		for (key, value) in params {
			match key.to_ascii_lowercase().as_str() {
				"oauth_token" => reply.token = Some(value.clone()),
				"oauth_token_secret" => reply.token_secret = Some(value.clone()),
				"encoded_user_id" => reply.encoded_user_id = Some(value.clone()),
				"user_id" => reply.user_id = Some(value.clone()),
				"screen_name" => reply.screen_name = Some(value.clone()),
				"oauth_problem" =>
					tracing::error!("Access-token exchange reported an OAuth problem: {value}."),
				_ => tracing::debug!("Access-token reply carried an unknown parameter: {key}={value}."),
			}
		}

		reply
	}
}

fn parse_bool(value: &str) -> bool {
	value.eq_ignore_ascii_case("true") || value == "1"
}

impl<T> Driver<T>
where
	T: ?Sized + OAuthTransport,
{
	/// Obtains a request token, updating the session's request-token pair and
	/// `callback_confirmed` flag as side effects.
	///
	/// Preconditions (request-token URL, consumer key, consumer secret) fail
	/// with [`ConfigError`] before any network call. An empty or failed reply
	/// is logged but only becomes fatal through the postcondition: a missing
	/// request token or secret latches the session failure.
	pub async fn obtain_request_token(&self) -> Result<BTreeMap<String, String>> {
		const KIND: ExchangeKind = ExchangeKind::RequestToken;

		obs::record_exchange_outcome(KIND, ExchangeOutcome::Attempt);

		let url = self.endpoints.request_token().to_owned();
		let extra = {
			let session = self.session.lock();
			let mut extra = Vec::new();

			if let Some(callback) = &session.callback_url {
				extra.push(("oauth_callback".to_owned(), callback.to_string()));
			}
			if let Some(name) = &self.config.application_display_name {
				extra.push(("xoauth_displayname".to_owned(), name.clone()));
			}
			if let Some(scope) = &self.config.application_scope {
				extra.push(("scope".to_owned(), scope.clone()));
			}

			extra
		};
		let body = match self.signed_exchange(&url, &extra, None, None).await {
			Ok(body) => body,
			Err(Error::Config(e)) => {
				obs::record_exchange_outcome(KIND, ExchangeOutcome::Failure);

				return Err(e.into());
			},
			Err(e) => {
				tracing::warn!("HTTP request for the request token failed: {e}.");

				String::new()
			},
		};
		let params = parse_reply(&body);
		let reply = RequestTokenReply::from_params(&params);
		let mut session = self.session.lock();

		let mut failed = false;

		if let Some(problem) = reported_problem(&params) {
			session.latch_failure(ProtocolError::Provider { problem });

			failed = true;
		}
		if let Some(token) = reply.token {
			session.credentials.request_token = Some(token);
		}
		if let Some(secret) = reply.token_secret {
			session.credentials.request_token_secret = Some(TokenSecret::new(secret));
		}
		if let Some(confirmed) = reply.callback_confirmed {
			session.callback_confirmed = confirmed;
		}

		if session.credentials.request_token.is_none() {
			tracing::warn!("Request token not returned.");
			session.latch_failure(ProtocolError::MissingReplyField { field: "oauth_token" });

			failed = true;
		}
		if session.credentials.request_token_secret.is_none() {
			tracing::warn!("Request token secret not returned.");
			session.latch_failure(ProtocolError::MissingReplyField { field: "oauth_token_secret" });

			failed = true;
		}

		obs::record_exchange_outcome(
			KIND,
			if failed { ExchangeOutcome::Failure } else { ExchangeOutcome::Success },
		);

		Ok(params)
	}

	/// Exchanges the verified request token for an access token, updating the
	/// access-token pair and identity fields as side effects and persisting
	/// credentials on success.
	///
	/// The signature uses the request token as the token key with no token
	/// secret; only the consumer secret contributes to the signing key.
	pub async fn obtain_access_token(&self) -> Result<BTreeMap<String, String>> {
		const KIND: ExchangeKind = ExchangeKind::AccessToken;

		obs::record_exchange_outcome(KIND, ExchangeOutcome::Attempt);

		let url = self.endpoints.access_token().to_owned();
		let prepared = {
			let session = self.session.lock();

			require(&session.credentials.request_token, "request_token").and_then(|token| {
				require(
					&session.credentials.request_token_secret.as_ref().map(|s| s.expose().to_owned()),
					"request_token_secret",
				)?;

				let verifier =
					require(&session.credentials.request_token_verifier, "request_token_verifier")?;

				Ok((token, vec![("oauth_verifier".to_owned(), verifier)]))
			})
		};
		let (request_token, extra) = match prepared {
			Ok(prepared) => prepared,
			Err(e) => {
				obs::record_exchange_outcome(KIND, ExchangeOutcome::Failure);

				return Err(e.into());
			},
		};
		let body = match self.signed_exchange(&url, &extra, Some(&request_token), None).await {
			Ok(body) => body,
			Err(Error::Config(e)) => {
				obs::record_exchange_outcome(KIND, ExchangeOutcome::Failure);

				return Err(e.into());
			},
			Err(e) => {
				tracing::warn!("HTTP request for the access token failed: {e}.");

				String::new()
			},
		};
		let params = parse_reply(&body);
		let reply = AccessTokenReply::from_params(&params);
		let document = {
			let mut session = self.session.lock();

			let mut failed = false;

			if let Some(problem) = reported_problem(&params) {
				session.latch_failure(ProtocolError::Provider { problem });

				failed = true;
			}
			if let Some(token) = reply.token {
				session.credentials.access_token = Some(token);
			}
			if let Some(secret) = reply.token_secret {
				session.credentials.access_token_secret = Some(TokenSecret::new(secret));
			}
			if let Some(id) = reply.encoded_user_id {
				session.identity.encoded_user_id = Some(id);
			}
			if let Some(id) = reply.user_id {
				session.identity.user_id = Some(id);
			}
			if let Some(name) = reply.screen_name {
				session.identity.screen_name = Some(name);
			}

			if session.credentials.access_token.is_none() {
				tracing::warn!("Access token not returned.");
				session.latch_failure(ProtocolError::MissingReplyField { field: "oauth_token" });

				failed = true;
			}
			if session.credentials.access_token_secret.is_none() {
				tracing::warn!("Access token secret not returned.");
				session
					.latch_failure(ProtocolError::MissingReplyField { field: "oauth_token_secret" });

				failed = true;
			}

			if failed {
				None
			} else {
				let document = self.stored_credentials(&session);

				session.credentials.clear_request_token();

				Some(document)
			}
		};

		match document {
			Some(document) => {
				if let Err(e) = self.store.save(document).await {
					tracing::error!("Failed to persist credentials: {e}.");
				}

				obs::record_exchange_outcome(KIND, ExchangeOutcome::Success);
			},
			None => obs::record_exchange_outcome(KIND, ExchangeOutcome::Failure),
		}

		Ok(params)
	}

	/// Signs and dispatches one token-exchange round trip.
	async fn signed_exchange(
		&self,
		url: &str,
		extra: &[(String, String)],
		token: Option<&str>,
		token_secret: Option<&str>,
	) -> Result<String> {
		let (consumer_key, consumer_secret) = self.consumer_pair();

		if url.trim_end_matches(['?', '&']).is_empty() {
			return Err(ConfigError::Missing { field: "token_endpoint" }.into());
		}
		if consumer_key.is_empty() {
			return Err(ConfigError::Missing { field: "consumer_key" }.into());
		}
		if consumer_secret.is_empty() {
			return Err(ConfigError::Missing { field: "consumer_secret" }.into());
		}

		let ctx = SignContext {
			signing_method: self.config.signing_method,
			http_method: self.config.http_method,
			consumer_key: &consumer_key,
			consumer_secret: &consumer_secret,
			token,
			token_secret,
			realm: self.config.realm.as_deref(),
			rsa_private_key: self.config.rsa_private_key.as_deref(),
		};
		let signed = signer::sign(url, extra, &ctx)?;

		tracing::debug!("Request URL: {}.", signed.url);
		tracing::debug!("Authorization header: {}.", signed.authorization);

		let body = match self.config.http_method {
			signer::HttpMethod::Get =>
				self.transport.get(&signed.url, &signed.authorization).await?,
			signer::HttpMethod::Post =>
				self.transport
					.post(&signed.base_url, &signed.authorization, &signed.form_body)
					.await?,
		};

		if body.is_empty() {
			tracing::warn!("Provider returned an empty reply.");
		} else {
			tracing::debug!("Provider reply: {body}.");
		}

		Ok(body)
	}
}

fn reported_problem(params: &BTreeMap<String, String>) -> Option<String> {
	params
		.iter()
		.find(|(key, _)| key.eq_ignore_ascii_case("oauth_problem"))
		.map(|(_, value)| value.clone())
}

fn require(value: &Option<String>, field: &'static str) -> Result<String, ConfigError> {
	value
		.as_ref()
		.filter(|value| !value.is_empty())
		.cloned()
		.ok_or(ConfigError::Missing { field })
}
