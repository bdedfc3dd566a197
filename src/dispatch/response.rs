// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{_prelude::*, error::DecodeError, http::TransportResponse};

/// Successful API response (status below 400).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
	/// HTTP status code.
	pub status: u16,
	/// Headers with lowercase names.
	pub headers: BTreeMap<String, String>,
	/// Raw body text.
	pub body: String,
}
impl Response {
	/// Case-insensitive header lookup.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
	}

	/// Raw body.
	pub fn text(&self) -> &str {
		&self.body
	}

	/// Decodes the body, reporting the JSON path that failed.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let de = &mut serde_json::Deserializer::from_str(&self.body);

		serde_path_to_error::deserialize(de)
			.map_err(|source| Error::from(DecodeError { source, status: self.status }))
	}
}
impl From<TransportResponse> for Response {
	fn from(response: TransportResponse) -> Self {
		Self { status: response.status, headers: response.headers, body: response.body }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[derive(Debug, Deserialize)]
	struct Contact {
		id: u64,
		name: String,
	}

	#[test]
	fn json_decodes_and_reports_failing_path() {
		let response: Response = TransportResponse::new(200, r#"{"id":7,"name":"Ada"}"#)
			.with_header("X-Request-Id", "abc")
			.into();
		let contact: Contact = response.json().expect("Body should decode.");

		assert_eq!((contact.id, contact.name.as_str()), (7, "Ada"));
		assert_eq!(response.header("x-request-id"), Some("abc"));

		let broken: Response = TransportResponse::new(200, r#"{"id":"seven","name":"Ada"}"#).into();
		let err = broken.json::<Contact>().expect_err("Wrong type should fail.");
		let Error::Decode(decode) = err else {
			panic!("Expected a decode error.");
		};

		assert_eq!(decode.path(), "id");
	}
}
