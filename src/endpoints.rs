//! Provider endpoint set consumed by the token exchange and the driver.

// self
use crate::{_prelude::*, error::ConfigError};

/// The four provider URLs a three-legged flow touches.
///
/// Every stored endpoint is normalized to end with a query separator on
/// assignment (`?`, or `&` when the URL already carries a query), so callers
/// can append `key=value` pairs without inspecting the URL first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
	api: String,
	request_token: String,
	access_token: String,
	authorization: String,
}
impl Endpoints {
	/// Derives the endpoint set from an API base URL using the conventional
	/// `/oauth/{request_token,access_token,authorize}` paths.
	pub fn for_api(api_url: impl AsRef<str>) -> Result<Self, ConfigError> {
		let api_url = api_url.as_ref().trim_end_matches('/');

		Url::parse(api_url).map_err(|source| ConfigError::InvalidUrl {
			url: api_url.to_owned(),
			source,
		})?;

		Ok(Self {
			api: api_url.to_owned(),
			request_token: with_query_separator(&format!("{api_url}/oauth/request_token")),
			access_token: with_query_separator(&format!("{api_url}/oauth/access_token")),
			authorization: with_query_separator(&format!("{api_url}/oauth/authorize")),
		})
	}

	/// Overrides the request-token endpoint.
	pub fn with_request_token_url(mut self, url: impl AsRef<str>) -> Self {
		self.request_token = with_query_separator(url.as_ref());

		self
	}

	/// Overrides the access-token endpoint.
	pub fn with_access_token_url(mut self, url: impl AsRef<str>) -> Self {
		self.access_token = with_query_separator(url.as_ref());

		self
	}

	/// Overrides the user-authorization endpoint.
	pub fn with_authorization_url(mut self, url: impl AsRef<str>) -> Self {
		self.authorization = with_query_separator(url.as_ref());

		self
	}

	/// API base URL without a trailing separator.
	pub fn api(&self) -> &str {
		&self.api
	}

	/// Request-token endpoint, separator-terminated.
	pub fn request_token(&self) -> &str {
		&self.request_token
	}

	/// Access-token endpoint, separator-terminated.
	pub fn access_token(&self) -> &str {
		&self.access_token
	}

	/// User-authorization endpoint, separator-terminated.
	pub fn authorization(&self) -> &str {
		&self.authorization
	}
}

fn with_query_separator(url: &str) -> String {
	if url.ends_with('?') || url.ends_with('&') {
		url.to_owned()
	} else if url.contains('?') {
		format!("{url}&")
	} else {
		format!("{url}?")
	}
}
