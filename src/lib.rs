//! Resilient, synchronous REST request layer for OAuth 2.0-protected APIs: PKCE authorization,
//! self-refreshing tokens, client-side rate limiting, and idempotency-aware retries in one crate.
//!
//! Start from [`config::ClientConfig`], hand it to [`dispatch::RequestDispatcher::builder`], and
//! send [`dispatch::ApiRequest`]s. Every collaborator (transport, cache, token storage, retry
//! policy, sleeper) is a trait object, so tests and multi-process deployments swap them freely.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod rate_limit;
pub mod retry;
pub mod sleep;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and a scripted transport for unit tests; enabled via `cfg(test)`
	//! or the `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::VecDeque;
	// self
	use crate::{
		error::TransportError,
		http::{Transport, TransportRequest, TransportResponse},
	};

	type Script = Arc<Mutex<VecDeque<Result<TransportResponse, String>>>>;

	/// Transport that replays queued outcomes in order and records every request it receives.
	///
	/// Clones share the script and the request log. Once the script runs dry every call fails
	/// with a network error.
	#[derive(Clone, Debug, Default)]
	pub struct ScriptedTransport {
		script: Script,
		requests: Arc<Mutex<Vec<TransportRequest>>>,
	}
	impl ScriptedTransport {
		/// Queues a response with `status` and `body`.
		pub fn respond(self, status: u16, body: impl Into<String>) -> Self {
			self.respond_with(TransportResponse::new(status, body))
		}

		/// Queues a fully built response.
		pub fn respond_with(self, response: TransportResponse) -> Self {
			self.script.lock().push_back(Ok(response));

			self
		}

		/// Queues a network failure carrying `message`.
		pub fn fail(self, message: impl Into<String>) -> Self {
			self.script.lock().push_back(Err(message.into()));

			self
		}

		/// Requests received so far, in call order.
		pub fn requests(&self) -> Vec<TransportRequest> {
			self.requests.lock().clone()
		}
	}
	impl Transport for ScriptedTransport {
		fn request(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
			self.requests.lock().push(request.clone());

			let next = self.script.lock().pop_front();

			match next {
				Some(Ok(response)) => Ok(response),
				Some(Err(message)) =>
					Err(TransportError::network(request.url.as_str(), std::io::Error::other(message))),
				None => Err(TransportError::network(
					request.url.as_str(),
					std::io::Error::other("Scripted transport ran out of responses."),
				)),
			}
		}
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")] pub use reqwest::Error as ReqwestError;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime, PrimitiveDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
