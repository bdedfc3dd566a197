// std
use std::{
	path::PathBuf,
	sync::Arc,
	time::{SystemTime, UNIX_EPOCH},
};
// self
use api_courier::{
	auth::{AccessToken, ScopeSet, TokenIdentity},
	cache::MemoryCache,
	config::StorageDriver,
	store::{CacheTokenStorage, FileTokenStorage, TokenStorage},
};

fn scratch_path(label: &str) -> PathBuf {
	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System clock should be after the unix epoch.")
		.as_nanos();

	std::env::temp_dir()
		.join(format!("api-courier-{label}-{}-{nanos}", std::process::id()))
		.join("tokens.json")
}

fn token(access: &str) -> AccessToken {
	AccessToken::builder()
		.access_token(access)
		.refresh_token(format!("{access}-refresh"))
		.expires_in(3600)
		.scopes(ScopeSet::new(["contacts"]).expect("Scope fixture should be valid."))
		.build()
		.expect("Token fixture should build.")
}

fn identity(raw: &str) -> TokenIdentity {
	TokenIdentity::new(raw).expect("Identity fixture should be valid.")
}

fn exercise(storage: &dyn TokenStorage) {
	let tenant_a = identity("tenant-a");
	let tenant_b = identity("tenant-b");

	assert!(storage.get(&tenant_a).expect("Empty read should succeed.").is_none());

	storage.store(&tenant_a, &token("a-1")).expect("Store should succeed.");
	storage.store(&tenant_b, &token("b-1")).expect("Store should succeed.");
	storage.store(&tenant_a, &token("a-2")).expect("Upsert should succeed.");

	let current = storage
		.get(&tenant_a)
		.expect("Read should succeed.")
		.expect("Token should be present after store.");

	assert_eq!(current.access_token().expose(), "a-2");
	assert_eq!(current.refresh_token().map(|secret| secret.expose()), Some("a-2-refresh"));
	assert!(current.has_scope("contacts"));

	storage.clear(&tenant_a).expect("Clear should succeed.");
	storage.clear(&tenant_a).expect("Clearing twice should be harmless.");

	assert!(storage.get(&tenant_a).expect("Read should succeed.").is_none());
	assert!(storage.get(&tenant_b).expect("Read should succeed.").is_some());
}

#[test]
fn cache_backend_honours_the_storage_contract() {
	let storage = CacheTokenStorage::new(Arc::new(MemoryCache::default()));

	exercise(&storage);
}

#[test]
fn file_backend_honours_the_storage_contract_and_survives_reopen() {
	let path = scratch_path("contract");
	let storage = FileTokenStorage::open(&path).expect("File storage should open.");

	exercise(&storage);

	let reopened = FileTokenStorage::open(&path).expect("File storage should reopen.");
	let survivor = reopened
		.get(&identity("tenant-b"))
		.expect("Read should succeed.")
		.expect("Token should survive a reopen.");

	assert_eq!(survivor.access_token().expose(), "b-1");

	if let Some(dir) = path.parent() {
		let _ = std::fs::remove_dir_all(dir);
	}
}

#[test]
fn storage_driver_is_selected_from_configuration() {
	let path = scratch_path("driver");
	let driver: StorageDriver = serde_json::from_value(serde_json::json!({
		"driver": "file",
		"path": path,
	}))
	.expect("File driver should deserialize.");
	let cache = Arc::new(MemoryCache::default());
	let storage = driver.build(cache.clone()).expect("File storage should build.");

	storage.store(&identity("tenant-c"), &token("c-1")).expect("Store should succeed.");

	assert!(path.exists());
	assert!(cache.is_empty());

	let volatile = StorageDriver::default().build(cache.clone()).expect("Cache storage should build.");

	volatile.store(&identity("tenant-c"), &token("c-2")).expect("Store should succeed.");

	assert_eq!(cache.len(), 1);

	if let Some(dir) = path.parent() {
		let _ = std::fs::remove_dir_all(dir);
	}
}

#[test]
fn file_backend_instances_on_one_path_share_rows() {
	let path = scratch_path("shared");
	let first = FileTokenStorage::open(&path).expect("File storage should open.");
	let second = FileTokenStorage::open(&path).expect("File storage should open.");

	first.store(&identity("tenant-a"), &token("a-1")).expect("Store should succeed.");
	second.store(&identity("tenant-b"), &token("b-1")).expect("Store should succeed.");
	first.store(&identity("tenant-a"), &token("a-2")).expect("Upsert should succeed.");

	let seen_by_second = second
		.get(&identity("tenant-a"))
		.expect("Read should succeed.")
		.expect("Row written by the other handle should be visible.");
	let kept_by_first = first
		.get(&identity("tenant-b"))
		.expect("Read should succeed.")
		.expect("Row written by the other handle should survive later writes.");

	assert_eq!(seen_by_second.access_token().expose(), "a-2");
	assert_eq!(kept_by_first.access_token().expose(), "b-1");

	if let Some(dir) = path.parent() {
		let _ = std::fs::remove_dir_all(dir);
	}
}
