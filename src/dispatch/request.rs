// self
use crate::{
	_prelude::*,
	http::{HttpMethod, MultipartPart, RequestBody},
};

/// One logical call against the remote API.
///
/// The endpoint is relative to the configured base URL. Retries and refreshes reuse the same
/// request, so it is never consumed by the dispatcher.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
	/// HTTP verb.
	pub method: HttpMethod,
	/// Path relative to the base URL.
	pub endpoint: String,
	/// Query pairs.
	pub query: Vec<(String, String)>,
	/// Extra headers sent with every attempt.
	pub headers: Vec<(String, String)>,
	/// Payload.
	pub body: RequestBody,
}
impl ApiRequest {
	/// Creates a request without query, headers, or body.
	pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
		Self {
			method,
			endpoint: endpoint.into(),
			query: Vec::new(),
			headers: Vec::new(),
			body: RequestBody::None,
		}
	}

	/// `GET endpoint`.
	pub fn get(endpoint: impl Into<String>) -> Self {
		Self::new(HttpMethod::Get, endpoint)
	}

	/// `POST endpoint`.
	pub fn post(endpoint: impl Into<String>) -> Self {
		Self::new(HttpMethod::Post, endpoint)
	}

	/// `PUT endpoint`.
	pub fn put(endpoint: impl Into<String>) -> Self {
		Self::new(HttpMethod::Put, endpoint)
	}

	/// `DELETE endpoint`.
	pub fn delete(endpoint: impl Into<String>) -> Self {
		Self::new(HttpMethod::Delete, endpoint)
	}

	/// Appends a query pair.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Appends a header.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Sets a JSON body.
	pub fn json(mut self, value: serde_json::Value) -> Self {
		self.body = RequestBody::Json(value);

		self
	}

	/// Serializes `value` into a JSON body.
	pub fn serialize_json<T>(self, value: &T) -> Result<Self, serde_json::Error>
	where
		T: ?Sized + Serialize,
	{
		Ok(self.json(serde_json::to_value(value)?))
	}

	/// Sets a multipart body.
	pub fn multipart(mut self, parts: Vec<MultipartPart>) -> Self {
		self.body = RequestBody::Multipart(parts);

		self
	}
}
