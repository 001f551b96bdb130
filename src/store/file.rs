//! File-backed [`TokenStateStore`] for fleets that share one host filesystem.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
	process,
};
// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	auth::{CachedToken, CooldownWindow, ProviderId, TokenSecret},
	store::{self, StoreError, StoreFuture, TokenStateStore},
};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
	#[serde(default)]
	tokens: HashMap<ProviderId, CachedToken>,
	#[serde(default)]
	cooldowns: HashMap<ProviderId, CooldownWindow>,
}

/// Persists shared state to a JSON file, replaced atomically on every write.
///
/// Every operation rereads the snapshot from disk, so a token written by one
/// process is visible to the next reader in another process without any cache
/// invalidation protocol. Writers within one handle (and its clones) serialize
/// through an internal guard; writers in different processes each stage a
/// uniquely named temporary file and rename it into place, where the last
/// rename wins.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	write_guard: Arc<Mutex<()>>,
}
impl FileStore {
	/// Opens a store at the provided path, creating parent directories and
	/// validating any existing snapshot.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::prepare_parent(&path)?;
		Self::load_snapshot(&path)?;

		Ok(Self { path, write_guard: Arc::new(Mutex::new(())) })
	}

	fn load_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
		if !path.exists() {
			return Ok(Snapshot::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read snapshot {}: {e}", path.display()),
		})?;

		// Tolerate a pre-created empty file.
		if bytes.is_empty() {
			return Ok(Snapshot::default());
		}

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to decode snapshot {}: {e}", path.display()),
		})
	}

	fn prepare_parent(path: &Path) -> Result<(), StoreError> {
		let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
			return Ok(());
		};

		fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
			message: format!("Failed to create snapshot directory {}: {e}", parent.display()),
		})
	}

	fn replace_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
		Self::prepare_parent(&self.path)?;

		let encoded = serde_json::to_vec_pretty(snapshot).map_err(|e| StoreError::Serialization {
			message: format!("Failed to encode store snapshot: {e}"),
		})?;
		let staging = self.staging_path();
		let published = self.publish_staged(&staging, &encoded);

		if published.is_err() {
			let _ = fs::remove_file(&staging);
		}

		published
	}

	/// Staging names are unique per write: under a fixed name, two processes
	/// replacing the snapshot at once truncate each other's half-written bytes
	/// before the rename lands.
	fn staging_path(&self) -> PathBuf {
		let suffix: String =
			rand::rng().sample_iter(Alphanumeric).take(8).map(char::from).collect();

		self.path.with_extension(format!("{}.{suffix}.tmp", process::id()))
	}

	fn publish_staged(&self, staging: &Path, encoded: &[u8]) -> Result<(), StoreError> {
		let mut file = File::create(staging).map_err(|e| StoreError::Backend {
			message: format!("Failed to stage {}: {e}", staging.display()),
		})?;

		file.write_all(encoded).map_err(|e| StoreError::Backend {
			message: format!("Failed to write {}: {e}", staging.display()),
		})?;
		file.sync_all().map_err(|e| StoreError::Backend {
			message: format!("Failed to flush {}: {e}", staging.display()),
		})?;
		drop(file);

		fs::rename(staging, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to publish {}: {e}", self.path.display()),
		})
	}

	fn write_token_now(
		&self,
		provider: &ProviderId,
		access_token: TokenSecret,
		expires_at: OffsetDateTime,
	) -> Result<(), StoreError> {
		let now = OffsetDateTime::now_utc();

		store::validate_token_write(&access_token, expires_at, now)?;

		let _writing = self.write_guard.lock();
		let mut snapshot = Self::load_snapshot(&self.path)?;

		snapshot
			.tokens
			.insert(provider.clone(), CachedToken::new(provider.clone(), access_token, expires_at, now));

		self.replace_snapshot(&snapshot)
	}

	fn invalidate_token_now(&self, provider: &ProviderId) -> Result<(), StoreError> {
		let now = OffsetDateTime::now_utc();
		let _writing = self.write_guard.lock();
		let mut snapshot = Self::load_snapshot(&self.path)?;

		// Nothing stored means nothing to back-date; skip the disk churn.
		let Some(record) = snapshot.tokens.get_mut(provider) else { return Ok(()) };

		record.expires_at = now - store::INVALIDATE_BACKDATE;
		record.updated_at = now;

		self.replace_snapshot(&snapshot)
	}

	fn write_cooldown_now(
		&self,
		provider: &ProviderId,
		backoff_until: OffsetDateTime,
	) -> Result<(), StoreError> {
		let now = OffsetDateTime::now_utc();
		let _writing = self.write_guard.lock();
		let mut snapshot = Self::load_snapshot(&self.path)?;
		let merged = store::merge_backoff(
			snapshot.cooldowns.get(provider).map(|window| window.backoff_until),
			backoff_until,
		);

		snapshot
			.cooldowns
			.insert(provider.clone(), CooldownWindow::new(provider.clone(), merged, now));

		self.replace_snapshot(&snapshot)
	}
}
impl TokenStateStore for FileStore {
	fn read_token<'a>(&'a self, provider: &'a ProviderId) -> StoreFuture<'a, Option<CachedToken>> {
		Box::pin(async move {
			Ok(Self::load_snapshot(&self.path)?.tokens.get(provider).cloned())
		})
	}

	fn write_token<'a>(
		&'a self,
		provider: &'a ProviderId,
		access_token: &'a TokenSecret,
		expires_at: OffsetDateTime,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.write_token_now(provider, access_token.to_owned(), expires_at) })
	}

	fn invalidate_token<'a>(&'a self, provider: &'a ProviderId) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.invalidate_token_now(provider) })
	}

	fn read_cooldown<'a>(
		&'a self,
		provider: &'a ProviderId,
	) -> StoreFuture<'a, Option<CooldownWindow>> {
		Box::pin(async move {
			Ok(Self::load_snapshot(&self.path)?.cooldowns.get(provider).cloned())
		})
	}

	fn write_cooldown<'a>(
		&'a self,
		provider: &'a ProviderId,
		backoff_until: OffsetDateTime,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.write_cooldown_now(provider, backoff_until) })
	}
}
