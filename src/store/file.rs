//! Durable [`TokenStorage`] that keeps one row per identity in a JSON file.

// std
use std::{
	ffi::OsString,
	fs::{self, File, OpenOptions},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
	process,
};
// crates.io
use fs4::fs_std::FileExt;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, ScopeSet, TokenIdentity, TokenSecret},
	oauth::pkce,
	obs,
	store::{StoreError, TokenStorage},
};

const TMP_SUFFIX_LEN: usize = 12;

/// Row layout persisted for each identity.
///
/// Scopes are kept as JSON text so the file stays readable by tools that treat the column as an
/// opaque string.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct TokenRow {
	identity: TokenIdentity,
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
	token_type: String,
	expires_in: u64,
	#[serde(default)]
	scope: Option<String>,
	#[serde(with = "time::serde::timestamp")]
	created_at: OffsetDateTime,
}
impl TokenRow {
	fn from_token(identity: &TokenIdentity, token: &AccessToken) -> Result<Self, StoreError> {
		let scope = serde_json::to_string(token.scopes().as_slice()).map_err(|e| {
			StoreError::Serialization { message: format!("Failed to encode scopes: {e}") }
		})?;

		Ok(Self {
			identity: identity.clone(),
			access_token: token.access_token().expose().to_owned(),
			refresh_token: token.refresh_token().map(|secret| secret.expose().to_owned()),
			token_type: token.token_type().to_owned(),
			expires_in: token.expires_in(),
			scope: Some(scope),
			created_at: token.created_at(),
		})
	}

	fn into_token(self) -> Result<AccessToken, StoreError> {
		// Null or unreadable scope columns degrade to an empty set.
		let scopes = self
			.scope
			.as_deref()
			.and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
			.and_then(|raw| ScopeSet::new(raw).ok())
			.unwrap_or_default();

		AccessToken::builder()
			.access_token(self.access_token)
			.token_type(self.token_type)
			.expires_in(self.expires_in)
			.maybe_refresh_token(self.refresh_token.map(TokenSecret::new))
			.scopes(scopes)
			.created_at(self.created_at)
			.build()
			.map_err(|e| StoreError::Serialization {
				message: format!("Stored row for {} is invalid: {e}", self.identity),
			})
	}
}

/// Persists tokens to a JSON file, re-reading it on every operation.
///
/// Several processes may share the file. Every operation holds an advisory lock on the sibling
/// `<file>.lock` for its whole read-modify-write cycle. Writes land in a uniquely named
/// temporary file and an atomic rename publishes them. A file that cannot be parsed is moved
/// aside to `<file>.corrupt` and treated as empty.
#[derive(Clone, Debug)]
pub struct FileTokenStorage {
	path: PathBuf,
	lock_path: PathBuf,
}
impl FileTokenStorage {
	/// Opens storage at the provided path, creating parent directories when missing.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let lock_path = sibling(&path, "lock");

		Ok(Self { path, lock_path })
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn lock(&self) -> Result<File, StoreError> {
		let file = OpenOptions::new()
			.create(true)
			.truncate(false)
			.read(true)
			.write(true)
			.open(&self.lock_path)
			.map_err(|e| StoreError::Backend {
				message: format!("Failed to open lock file {}: {e}", self.lock_path.display()),
			})?;

		file.lock_exclusive().map_err(|e| StoreError::Backend {
			message: format!("Failed to lock {}: {e}", self.lock_path.display()),
		})?;

		// Released when the handle is dropped.
		Ok(file)
	}

	fn load_rows(&self) -> Result<Vec<TokenRow>, StoreError> {
		let bytes = match fs::read(&self.path) {
			Ok(bytes) => bytes,
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) =>
				return Err(StoreError::Backend {
					message: format!("Failed to read {}: {e}", self.path.display()),
				}),
		};

		if bytes.iter().all(u8::is_ascii_whitespace) {
			return Ok(Vec::new());
		}

		match serde_json::from_slice(&bytes) {
			Ok(rows) => Ok(rows),
			Err(e) => {
				self.quarantine(&e)?;

				Ok(Vec::new())
			},
		}
	}

	fn quarantine(&self, cause: &serde_json::Error) -> Result<(), StoreError> {
		let target = sibling(&self.path, "corrupt");

		obs::storage_file_quarantined(&self.path, &target, cause);

		match fs::rename(&self.path, &target) {
			Ok(()) => Ok(()),
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StoreError::Backend {
				message: format!("Failed to move unreadable {} aside: {e}", self.path.display()),
			}),
		}
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create storage directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist(&self, rows: &[TokenRow]) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized = serde_json::to_vec_pretty(rows).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize token rows: {e}"),
		})?;
		let tmp_path = sibling(
			&self.path,
			&format!("{}.{}.tmp", process::id(), pkce::random_string(TMP_SUFFIX_LEN)),
		);
		let written = Self::write_new(&tmp_path, &serialized).and_then(|()| {
			fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
				message: format!("Failed to replace {}: {e}", self.path.display()),
			})
		});

		if written.is_err() {
			let _ = fs::remove_file(&tmp_path);
		}

		written
	}

	fn write_new(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
		let mut file = OpenOptions::new().write(true).create_new(true).open(path).map_err(|e| {
			StoreError::Backend { message: format!("Failed to create {}: {e}", path.display()) }
		})?;

		file.write_all(bytes).map_err(|e| StoreError::Backend {
			message: format!("Failed to write {}: {e}", path.display()),
		})?;
		file.sync_all().map_err(|e| StoreError::Backend {
			message: format!("Failed to sync {}: {e}", path.display()),
		})
	}
}
impl TokenStorage for FileTokenStorage {
	fn store(&self, identity: &TokenIdentity, token: &AccessToken) -> Result<(), StoreError> {
		let row = TokenRow::from_token(identity, token)?;
		let _lock = self.lock()?;
		let mut rows = self.load_rows()?;

		match rows.iter_mut().find(|existing| &existing.identity == identity) {
			Some(existing) => *existing = row,
			None => rows.push(row),
		}

		self.persist(&rows)
	}

	fn get(&self, identity: &TokenIdentity) -> Result<Option<AccessToken>, StoreError> {
		// Exclusive as well; an unreadable file is moved aside while reading.
		let rows = {
			let _lock = self.lock()?;

			self.load_rows()?
		};

		rows.into_iter().find(|row| &row.identity == identity).map(TokenRow::into_token).transpose()
	}

	fn clear(&self, identity: &TokenIdentity) -> Result<(), StoreError> {
		let _lock = self.lock()?;
		let mut rows = self.load_rows()?;
		let before = rows.len();

		rows.retain(|row| &row.identity != identity);

		if rows.len() == before {
			return Ok(());
		}

		self.persist(&rows)
	}
}

/// `<file>.<suffix>` next to `path`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
	let mut name = path.file_name().map(OsString::from).unwrap_or_else(|| OsString::from("tokens"));

	name.push(".");
	name.push(suffix);

	path.with_file_name(name)
}
