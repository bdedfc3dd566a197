//! Access token value objects and their redacting secret wrapper.

pub mod access;
pub mod secret;
