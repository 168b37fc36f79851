//! Credential and identity state mutated by the authorization flow.

// self
use crate::_prelude::*;

/// Redacted secret wrapper keeping consumer and token secrets out of logs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner secret value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Whether the wrapped secret is the empty string.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl From<&str> for TokenSecret {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// OAuth 1.0a credential state carried across the three-legged flow.
///
/// The consumer key and secret are immutable configuration; the token fields
/// are session state mutated by the driver and the token exchange. A session
/// counts as authorized exactly when the access token and access token secret
/// are both present.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
	/// Consumer (application) key, posted in plain text.
	pub consumer_key: String,
	/// Consumer secret, first half of the signing key.
	pub consumer_secret: TokenSecret,
	/// Short-lived request token identifying the unauthorized session.
	pub request_token: Option<String>,
	/// Secret paired with the request token.
	pub request_token_secret: Option<TokenSecret>,
	/// One-time verifier returned after user consent.
	pub request_token_verifier: Option<String>,
	/// Long-lived access token authorizing signed API calls.
	pub access_token: Option<String>,
	/// Secret paired with the access token, second half of the signing key.
	pub access_token_secret: Option<TokenSecret>,
}
impl Credentials {
	/// Creates credential state from the immutable consumer pair.
	pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
		Self {
			consumer_key: consumer_key.into(),
			consumer_secret: TokenSecret::new(consumer_secret.into()),
			..Default::default()
		}
	}

	/// Whether the access token and access token secret are both present.
	pub fn is_authorized(&self) -> bool {
		self.access_token.as_deref().is_some_and(|t| !t.is_empty())
			&& self.access_token_secret.as_ref().is_some_and(|s| !s.is_empty())
	}

	/// Drops the request-token leg once it has been exchanged or invalidated.
	pub(crate) fn clear_request_token(&mut self) {
		self.request_token = None;
		self.request_token_secret = None;
		self.request_token_verifier = None;
	}
}
/// User identity fields populated opportunistically from token-exchange
/// replies or the credential file. Never validated, passed through as-is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity {
	/// Provider-side display name.
	pub screen_name: Option<String>,
	/// Provider-side user identifier.
	pub user_id: Option<String>,
	/// Encoded variant of the user identifier.
	pub encoded_user_id: Option<String>,
	/// Legacy password field some providers echo back.
	pub user_password: Option<String>,
	/// Encoded variant of the password field.
	pub encoded_user_password: Option<String>,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = TokenSecret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "TokenSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
	}

	#[test]
	fn authorized_requires_both_halves() {
		let mut credentials = Credentials::new("key", "secret");

		assert!(!credentials.is_authorized());

		credentials.access_token = Some("token".into());

		assert!(!credentials.is_authorized());

		credentials.access_token_secret = Some(TokenSecret::new("token-secret"));

		assert!(credentials.is_authorized());

		credentials.access_token = Some(String::new());

		assert!(!credentials.is_authorized());
	}
}
