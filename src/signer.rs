//! OAuth 1.0a request signing.
//!
//! [`sign`] splits a URL into its base and query parameters, folds in any
//! extra parameters, fills the standard `oauth_*` parameter set, computes the
//! signature over the canonical base string, and serializes the result both
//! as a signed request URL and as an `Authorization` header value. The realm,
//! when configured, is injected into the header only — per OAuth Core 1.0
//! §9.1.1 it must never enter the signature base string.

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use rand::{Rng, distr::Alphanumeric};
use rsa::{
	RsaPrivateKey,
	pkcs1::DecodeRsaPrivateKey,
	pkcs1v15::SigningKey,
	pkcs8::DecodePrivateKey,
	signature::{SignatureEncoding, Signer as _},
};
use sha1::Sha1;
// self
use crate::{_prelude::*, error::ConfigError};

/// RFC 3986 unreserved characters stay literal; everything else is encoded.
const OAUTH_ENCODE_SET: &AsciiSet =
	&NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');
const NONCE_LEN: usize = 32;

/// OAuth 1.0a signature methods.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SigningMethod {
	/// HMAC-SHA1 keyed by `consumer_secret&token_secret`.
	#[default]
	HmacSha1,
	/// PKCS#1 v1.5 RSA signature over the base string.
	RsaSha1,
	/// Literal `consumer_secret&token_secret`, for TLS-only providers.
	Plaintext,
}
impl SigningMethod {
	/// Returns the protocol identifier carried in `oauth_signature_method`.
	pub const fn as_str(self) -> &'static str {
		match self {
			SigningMethod::HmacSha1 => "HMAC-SHA1",
			SigningMethod::RsaSha1 => "RSA-SHA1",
			SigningMethod::Plaintext => "PLAINTEXT",
		}
	}
}
impl Display for SigningMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// HTTP methods covered by the signing engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HttpMethod {
	/// Parameters travel in the request URL.
	#[default]
	Get,
	/// Non-`oauth_` parameters travel as a form-encoded body.
	Post,
}
impl HttpMethod {
	/// Returns the uppercase method name used in the signature base string.
	pub const fn as_str(self) -> &'static str {
		match self {
			HttpMethod::Get => "GET",
			HttpMethod::Post => "POST",
		}
	}
}
impl Display for HttpMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Immutable inputs consumed by [`sign`].
#[derive(Clone, Copy, Debug)]
pub struct SignContext<'a> {
	/// Signature method recorded in `oauth_signature_method`.
	pub signing_method: SigningMethod,
	/// HTTP method the request will be issued with.
	pub http_method: HttpMethod,
	/// Consumer key, posted in plain text.
	pub consumer_key: &'a str,
	/// Consumer secret, first half of the signing key.
	pub consumer_secret: &'a str,
	/// Token key (request or access token), posted in plain text.
	pub token: Option<&'a str>,
	/// Token secret, second half of the signing key.
	pub token_secret: Option<&'a str>,
	/// Unsigned realm injected into the header.
	pub realm: Option<&'a str>,
	/// PEM-encoded private key, required for RSA-SHA1.
	pub rsa_private_key: Option<&'a str>,
}

/// A signed request in both of its wire serializations.
#[derive(Clone, Debug)]
pub struct SignedRequest {
	/// Full request URL carrying every parameter, `&`-joined.
	pub url: String,
	/// `Authorization` header value: `OAuth ` + optional realm + `oauth_*`
	/// parameters, `, `-joined, values double-quoted.
	pub authorization: String,
	/// URL stripped of its query, for POST dispatch.
	pub base_url: String,
	/// Non-`oauth_` parameters form-encoded, the POST body.
	pub form_body: String,
}

/// Signs `url` (plus `extra` key/value parameters) for the given context.
///
/// Standard `oauth_*` parameters are generated automatically unless the URL
/// or `extra` already carries a value for the same key, so callers can pin
/// `oauth_nonce` and `oauth_timestamp` when reproducibility matters.
pub fn sign(
	url: &str,
	extra: &[(String, String)],
	ctx: &SignContext<'_>,
) -> Result<SignedRequest, ConfigError> {
	let (base_url, mut params) = split_url(url);

	params.extend(extra.iter().cloned());
	fill_oauth_params(&mut params, ctx);
	params.sort_by(|a, b| encode(&a.0).cmp(&encode(&b.0)).then_with(|| encode(&a.1).cmp(&encode(&b.1))));

	let base_string = signature_base_string(ctx.http_method, &base_url, &params);
	let signature = compute_signature(ctx, &base_string)?;

	params.push(("oauth_signature".into(), signature));

	Ok(SignedRequest {
		url: format!("{base_url}?{}", serialize_query(&params)),
		authorization: serialize_header(&params, ctx.realm),
		form_body: serialize_form_body(&params),
		base_url,
	})
}

/// Splits a URL into its base and decoded query parameters.
///
/// Endpoint URLs are normalized to end with a query separator, so trailing
/// empty segments are expected and skipped.
fn split_url(url: &str) -> (String, Vec<(String, String)>) {
	let (base, query) = match url.split_once('?') {
		Some((base, query)) => (base, query),
		None => (url, ""),
	};
	let params = query
		.split('&')
		.filter(|pair| !pair.is_empty())
		.map(|pair| {
			let (key, value) = pair.split_once('=').unwrap_or((pair, ""));

			(decode(key), decode(value))
		})
		.collect();

	(base.trim_end_matches('&').trim_end_matches('?').to_owned(), params)
}

fn fill_oauth_params(params: &mut Vec<(String, String)>, ctx: &SignContext<'_>) {
	let mut ensure = |key: &str, value: String| {
		if !params.iter().any(|(k, _)| k == key) {
			params.push((key.to_owned(), value));
		}
	};

	ensure("oauth_consumer_key", ctx.consumer_key.to_owned());
	ensure("oauth_nonce", random_string(NONCE_LEN));
	ensure("oauth_timestamp", OffsetDateTime::now_utc().unix_timestamp().to_string());
	ensure("oauth_signature_method", ctx.signing_method.as_str().to_owned());
	ensure("oauth_version", "1.0".to_owned());

	if let Some(token) = ctx.token.filter(|t| !t.is_empty()) {
		ensure("oauth_token", token.to_owned());
	}
}

fn signature_base_string(method: HttpMethod, base_url: &str, params: &[(String, String)]) -> String {
	let normalized = params
		.iter()
		.map(|(k, v)| format!("{}={}", encode(k), encode(v)))
		.collect::<Vec<_>>()
		.join("&");

	format!("{}&{}&{}", method.as_str(), encode(base_url), encode(&normalized))
}

fn compute_signature(ctx: &SignContext<'_>, base_string: &str) -> Result<String, ConfigError> {
	let key = format!(
		"{}&{}",
		encode(ctx.consumer_secret),
		encode(ctx.token_secret.unwrap_or_default()),
	);

	match ctx.signing_method {
		SigningMethod::HmacSha1 => {
			let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
				.expect("HMAC-SHA1 accepts keys of any length");

			mac.update(base_string.as_bytes());

			Ok(BASE64.encode(mac.finalize().into_bytes()))
		},
		SigningMethod::Plaintext => Ok(key),
		SigningMethod::RsaSha1 => {
			let pem = ctx
				.rsa_private_key
				.filter(|pem| !pem.is_empty())
				.ok_or(ConfigError::Missing { field: "rsa_private_key" })?;
			let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
				.or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
				.map_err(|_| ConfigError::InvalidRsaKey)?;
			let signing_key = SigningKey::<Sha1>::new(private_key);
			let signature = signing_key.sign(base_string.as_bytes());

			Ok(BASE64.encode(signature.to_bytes()))
		},
	}
}

fn serialize_query(params: &[(String, String)]) -> String {
	params
		.iter()
		.map(|(k, v)| format!("{}={}", encode(k), encode(v)))
		.collect::<Vec<_>>()
		.join("&")
}

fn serialize_header(params: &[(String, String)], realm: Option<&str>) -> String {
	let oauth_params = params
		.iter()
		.filter(|(k, _)| k.starts_with("oauth_"))
		.map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
		.collect::<Vec<_>>()
		.join(", ");

	match realm.filter(|realm| !realm.is_empty()) {
		Some(realm) => format!("OAuth realm=\"{realm}\", {oauth_params}"),
		None => format!("OAuth {oauth_params}"),
	}
}

fn serialize_form_body(params: &[(String, String)]) -> String {
	params
		.iter()
		.filter(|(k, _)| !k.starts_with("oauth_"))
		.map(|(k, v)| format!("{}={}", encode(k), encode(v)))
		.collect::<Vec<_>>()
		.join("&")
}

pub(crate) fn encode(value: &str) -> String {
	utf8_percent_encode(value, OAUTH_ENCODE_SET).to_string()
}

fn decode(value: &str) -> String {
	percent_decode_str(value).decode_utf8_lossy().into_owned()
}

pub(crate) fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}
