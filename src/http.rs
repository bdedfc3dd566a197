//! Transport primitives shared by the dispatcher and the OAuth 2.0 token manager.
//!
//! [`Transport`] is the crate's only dependency on an HTTP stack. Implementations return every
//! response they receive, whatever its status; [`TransportResponse::error_for_status`] lifts
//! statuses of 400 and above into [`ApiError`] so the caller decides how to classify them.
//! Transport errors are reserved for calls that produced no response at all.

// crates.io
#[cfg(feature = "reqwest")]
use reqwest::blocking::{
	Client as BlockingClient, RequestBuilder,
	multipart::{Form, Part},
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ApiError, TransportError},
};

/// HTTP verbs issued against the remote API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `DELETE`
	Delete,
}
impl HttpMethod {
	/// Returns `true` when repeating the call cannot duplicate a side effect.
	pub const fn is_idempotent(self) -> bool {
		!matches!(self, Self::Post)
	}

	/// Upper-case wire name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
			Self::Put => "PUT",
			Self::Delete => "DELETE",
		}
	}
}
impl Display for HttpMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// One part of a `multipart/form-data` body.
#[derive(Clone, PartialEq, Eq)]
pub struct MultipartPart {
	/// Form field name.
	pub name: String,
	/// Raw part contents.
	pub contents: Vec<u8>,
	/// File name announced for file uploads.
	pub filename: Option<String>,
	/// MIME type of the part, if known.
	pub content_type: Option<String>,
}
impl MultipartPart {
	/// Creates a plain text field.
	pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			contents: value.into().into_bytes(),
			filename: None,
			content_type: None,
		}
	}

	/// Creates a binary field.
	pub fn bytes(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
		Self { name: name.into(), contents: contents.into(), filename: None, content_type: None }
	}

	/// Sets the announced file name.
	pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
		self.filename = Some(filename.into());

		self
	}

	/// Sets the MIME type.
	pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
		self.content_type = Some(content_type.into());

		self
	}
}
impl Debug for MultipartPart {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("MultipartPart")
			.field("name", &self.name)
			.field("len", &self.contents.len())
			.field("filename", &self.filename)
			.field("content_type", &self.content_type)
			.finish()
	}
}

/// Request payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RequestBody {
	/// No body.
	#[default]
	None,
	/// JSON document sent as `application/json`.
	Json(serde_json::Value),
	/// URL-encoded form, used for OAuth 2.0 endpoints.
	Form(Vec<(String, String)>),
	/// `multipart/form-data` upload.
	Multipart(Vec<MultipartPart>),
}

/// Fully resolved request handed to a [`Transport`].
#[derive(Clone, Debug, PartialEq)]
pub struct TransportRequest {
	/// HTTP verb.
	pub method: HttpMethod,
	/// Absolute target URL.
	pub url: Url,
	/// Headers in insertion order.
	pub headers: Vec<(String, String)>,
	/// Query pairs appended to `url`.
	pub query: Vec<(String, String)>,
	/// Payload.
	pub body: RequestBody,
	/// Per-attempt timeout, if any.
	pub timeout: Option<StdDuration>,
}
impl TransportRequest {
	/// Creates a request without headers, query, or body.
	pub fn new(method: HttpMethod, url: Url) -> Self {
		Self {
			method,
			url,
			headers: Vec::new(),
			query: Vec::new(),
			body: RequestBody::None,
			timeout: None,
		}
	}

	/// Appends a header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Appends query pairs.
	pub fn with_query<I, K, V>(mut self, pairs: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.query.extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));

		self
	}

	/// Replaces the body.
	pub fn with_body(mut self, body: RequestBody) -> Self {
		self.body = body;

		self
	}

	/// Sets the per-attempt timeout.
	pub fn with_timeout(mut self, timeout: Option<StdDuration>) -> Self {
		self.timeout = timeout;

		self
	}

	/// Case-insensitive header lookup returning the first match.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.iter().find(|(k, _)| k.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
	}

	/// Form field lookup for [`RequestBody::Form`] payloads.
	pub fn form_value(&self, name: &str) -> Option<&str> {
		match &self.body {
			RequestBody::Form(pairs) =>
				pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str()),
			_ => None,
		}
	}
}

/// Response received from the remote side, whatever its status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportResponse {
	/// HTTP status code.
	pub status: u16,
	/// Headers with lowercase names.
	pub headers: BTreeMap<String, String>,
	/// Raw body text.
	pub body: String,
}
impl TransportResponse {
	/// Creates a response without headers.
	pub fn new(status: u16, body: impl Into<String>) -> Self {
		Self { status, headers: BTreeMap::new(), body: body.into() }
	}

	/// Adds a header, lowercasing its name.
	pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
		self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());

		self
	}

	/// Returns `true` for statuses below 400.
	pub fn is_success(&self) -> bool {
		self.status < 400
	}

	/// Case-insensitive header lookup.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
	}

	/// `Retry-After` hint in whole seconds, if present and still in the future.
	pub fn retry_after(&self) -> Option<u64> {
		self.header("retry-after").and_then(|raw| parse_retry_after(raw, OffsetDateTime::now_utc()))
	}

	/// Converts statuses of 400 and above into [`ApiError`], keeping the body verbatim.
	pub fn error_for_status(self) -> Result<Self, ApiError> {
		if self.is_success() {
			return Ok(self);
		}

		let retry_after = self.retry_after();

		Err(ApiError { status: self.status, body: self.body, retry_after, headers: self.headers })
	}
}

/// Blocking HTTP transport.
pub trait Transport
where
	Self: Send + Sync,
{
	/// Executes one attempt; fails only when no response was received.
	fn request(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError>;
}
impl<T> Transport for Arc<T>
where
	T: ?Sized + Transport,
{
	fn request(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
		(**self).request(request)
	}
}

/// [`Transport`] backed by a blocking reqwest client.
///
/// Redirects are not followed: OAuth 2.0 token endpoints answer directly, and the remote API is
/// addressed by absolute URL.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(BlockingClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a client with redirects disabled.
	pub fn new() -> Result<Self, crate::error::ConfigError> {
		let client =
			BlockingClient::builder().redirect(reqwest::redirect::Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing blocking client.
	pub fn with_client(client: BlockingClient) -> Self {
		Self(client)
	}

	fn build(&self, request: &TransportRequest) -> Result<RequestBuilder, TransportError> {
		let method = match request.method {
			HttpMethod::Get => reqwest::Method::GET,
			HttpMethod::Post => reqwest::Method::POST,
			HttpMethod::Put => reqwest::Method::PUT,
			HttpMethod::Delete => reqwest::Method::DELETE,
		};
		let mut builder = self.0.request(method, request.url.clone());

		for (name, value) in &request.headers {
			builder = builder.header(name.as_str(), value.as_str());
		}
		if !request.query.is_empty() {
			builder = builder.query(&request.query);
		}
		if let Some(timeout) = request.timeout {
			builder = builder.timeout(timeout);
		}

		builder = match &request.body {
			RequestBody::None => builder,
			RequestBody::Json(value) => builder.json(value),
			RequestBody::Form(pairs) => builder.form(pairs),
			RequestBody::Multipart(parts) => builder.multipart(multipart_form(&request.url, parts)?),
		};

		Ok(builder)
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	fn request(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
		let response = self.build(request)?.send()?;
		let status = response.status().as_u16();
		let headers = response
			.headers()
			.iter()
			.filter_map(|(name, value)| {
				value.to_str().ok().map(|value| (name.as_str().to_owned(), value.to_owned()))
			})
			.collect();
		let body = response.text()?;

		Ok(TransportResponse { status, headers, body })
	}
}

#[cfg(feature = "reqwest")]
fn multipart_form(url: &Url, parts: &[MultipartPart]) -> Result<Form, TransportError> {
	let mut form = Form::new();

	for part in parts {
		let mut body = Part::bytes(part.contents.clone());

		if let Some(filename) = &part.filename {
			body = body.file_name(filename.clone());
		}
		if let Some(content_type) = &part.content_type {
			body = body
				.mime_str(content_type)
				.map_err(|e| TransportError::network(url.as_str(), e))?;
		}

		form = form.part(part.name.clone(), body);
	}

	Ok(form)
}

/// Parses a `Retry-After` value given as delta-seconds or an HTTP-date.
///
/// Dates are rounded up to the next whole second; dates in the past yield `None`.
pub fn parse_retry_after(raw: &str, now: OffsetDateTime) -> Option<u64> {
	let raw = raw.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(secs);
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - now;

		if delta.is_positive() {
			let secs = delta.whole_seconds() as u64;

			return Some(if delta.subsec_nanoseconds() > 0 { secs + 1 } else { secs });
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn only_post_is_non_idempotent() {
		assert!(HttpMethod::Get.is_idempotent());
		assert!(HttpMethod::Put.is_idempotent());
		assert!(HttpMethod::Delete.is_idempotent());
		assert!(!HttpMethod::Post.is_idempotent());
	}

	#[test]
	fn retry_after_accepts_seconds_and_dates() {
		let now = macros::datetime!(2025-01-01 00:00:00 UTC);

		assert_eq!(parse_retry_after(" 10 ", now), Some(10));
		assert_eq!(parse_retry_after("Wed, 01 Jan 2025 00:00:42 +0000", now), Some(42));
		assert_eq!(parse_retry_after("Tue, 31 Dec 2024 23:59:00 +0000", now), None);
		assert_eq!(parse_retry_after("soon", now), None);
	}

	#[test]
	fn error_for_status_keeps_body_and_hint() {
		let ok = TransportResponse::new(204, "");

		assert!(ok.error_for_status().is_ok());

		let err = TransportResponse::new(429, "{\"message\":\"slow down\"}")
			.with_header("Retry-After", "7")
			.error_for_status()
			.expect_err("429 should be lifted into an API error.");

		assert_eq!(err.status, 429);
		assert_eq!(err.body, "{\"message\":\"slow down\"}");
		assert_eq!(err.retry_after, Some(7));
		assert_eq!(err.headers.get("retry-after").map(String::as_str), Some("7"));
	}

	#[test]
	fn request_lookups_are_case_insensitive_for_headers() {
		let url = Url::parse("https://api.example.com/v1/contacts").expect("URL should parse.");
		let request = TransportRequest::new(HttpMethod::Post, url)
			.with_header("Accept", "application/json")
			.with_body(RequestBody::Form(vec![("grant_type".into(), "refresh_token".into())]));

		assert_eq!(request.header("accept"), Some("application/json"));
		assert_eq!(request.form_value("grant_type"), Some("refresh_token"));
		assert_eq!(request.form_value("missing"), None);
	}
}
