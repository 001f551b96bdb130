//! Lease-file [`RefreshLock`] for fleets that share one host filesystem.

// std
use std::{
	fs::{self, OpenOptions},
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
	process,
};
// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	lock::{LockError, LockFuture, LockKey, RefreshLock},
};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Lease {
	holder_id: String,
	acquired_at: OffsetDateTime,
	expires_at: OffsetDateTime,
}
impl Lease {
	fn new(holder_id: &str, now: OffsetDateTime, ttl: Duration) -> Self {
		Self { holder_id: holder_id.to_owned(), acquired_at: now, expires_at: now + ttl }
	}

	fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}
}

/// One lease file per key under a shared directory.
///
/// `create_new` is the acquisition arbiter, so only one instance can mint a
/// lease for a key. Leases expire after a TTL; a contender takes a dead lease
/// over by renaming it to a holder-unique claim name first, so of all the
/// contenders that judged it dead exactly one proceeds to the re-create and
/// everyone else counts the attempt as not acquired. Release claims the lease
/// the same way and only completes for the instance that wrote it.
#[derive(Clone, Debug)]
pub struct FileLock {
	dir: PathBuf,
	holder_id: String,
	lease_ttl: Duration,
}
impl FileLock {
	/// Default lease lifetime, comfortably longer than one bounded refresh attempt.
	pub const DEFAULT_LEASE_TTL: Duration = Duration::seconds(30);

	/// Opens a lock rooted at the provided directory, creating it if needed.
	///
	/// Each call mints a distinct holder identity, so two handles opened on the
	/// same directory exclude each other exactly like two processes would.
	pub fn open(dir: impl Into<PathBuf>) -> Result<Self, LockError> {
		let dir = dir.into();

		fs::create_dir_all(&dir).map_err(|e| LockError::Backend {
			message: format!("Failed to create lock directory {}: {e}", dir.display()),
		})?;

		let suffix: String =
			rand::rng().sample_iter(Alphanumeric).take(12).map(char::from).collect();
		let holder_id = format!("{}-{suffix}", process::id());

		Ok(Self { dir, holder_id, lease_ttl: Self::DEFAULT_LEASE_TTL })
	}

	/// Overrides the lease lifetime (negative values clamp to zero).
	pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
		self.lease_ttl = ttl.max(Duration::ZERO);

		self
	}

	fn lease_path(&self, key: LockKey) -> PathBuf {
		self.dir.join(format!("{key}.lock"))
	}

	/// `true` once the file has sat unmodified for a full lease lifetime.
	fn abandoned(path: &Path, ttl: Duration) -> bool {
		fs::metadata(path)
			.and_then(|meta| meta.modified())
			.ok()
			.and_then(|modified| modified.elapsed().ok())
			.is_some_and(|age| age >= ttl.unsigned_abs())
	}

	/// Moves the lease aside under this holder's name before touching it.
	///
	/// The rename succeeds for exactly one contender per lease file, and the
	/// byte comparison rejects a claim that caught a rival lease written after
	/// `observed` was read. `Ok(false)` means the race was lost either way.
	fn claim_lease(&self, path: &Path, observed: &[u8]) -> Result<bool, LockError> {
		let claim = path.with_extension(format!("{}.claim", self.holder_id));

		match fs::rename(path, &claim) {
			Ok(()) => {},
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
			Err(e) => {
				return Err(LockError::Backend {
					message: format!("Failed to claim lease {}: {e}", path.display()),
				});
			},
		}

		if fs::read(&claim).is_ok_and(|claimed| claimed == observed) {
			let _ = fs::remove_file(&claim);

			return Ok(true);
		}

		// The claim caught a live rival lease; hand it back unless its slot
		// has already been refilled.
		let _ = fs::hard_link(&claim, path);
		let _ = fs::remove_file(&claim);

		Ok(false)
	}

	/// Attempts the `create_new` write; `Ok(false)` means another lease exists.
	fn write_lease(&self, path: &Path, now: OffsetDateTime) -> Result<bool, LockError> {
		let lease = Lease::new(&self.holder_id, now, self.lease_ttl);
		let serialized = serde_json::to_vec(&lease).map_err(|e| LockError::Backend {
			message: format!("Failed to serialize lease: {e}"),
		})?;
		let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
			Ok(file) => file,
			Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
			Err(e) => {
				return Err(LockError::Backend {
					message: format!("Failed to create lease {}: {e}", path.display()),
				});
			},
		};

		file.write_all(&serialized).map_err(|e| LockError::Backend {
			message: format!("Failed to write lease {}: {e}", path.display()),
		})?;
		file.sync_all().map_err(|e| LockError::Backend {
			message: format!("Failed to sync lease {}: {e}", path.display()),
		})?;

		Ok(true)
	}

	fn try_acquire_now(&self, key: LockKey) -> Result<bool, LockError> {
		let path = self.lease_path(key);
		let now = OffsetDateTime::now_utc();

		if self.write_lease(&path, now)? {
			return Ok(true);
		}

		let observed = match fs::read(&path) {
			Ok(bytes) => bytes,
			// Vanished between the create attempt and the read; whoever
			// claimed it owns the next move.
			Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
			Err(e) => {
				return Err(LockError::Backend {
					message: format!("Failed to read lease {}: {e}", path.display()),
				});
			},
		};

		// Only an expired lease, or an unreadable one old enough that no
		// writer can still be mid-write, may be taken over.
		match serde_json::from_slice::<Lease>(&observed) {
			Ok(lease) if !lease.is_expired_at(now) => return Ok(false),
			Ok(_) => {},
			Err(_) if !Self::abandoned(&path, self.lease_ttl) => return Ok(false),
			Err(_) => {},
		}
		if !self.claim_lease(&path, &observed)? {
			return Ok(false);
		}

		self.write_lease(&path, now)
	}

	fn release_now(&self, key: LockKey) -> Result<(), LockError> {
		let path = self.lease_path(key);
		// Unheld, foreign, and unreadable leases are left in place.
		let Ok(observed) = fs::read(&path) else {
			return Ok(());
		};
		let Ok(lease) = serde_json::from_slice::<Lease>(&observed) else {
			return Ok(());
		};

		if lease.holder_id != self.holder_id {
			return Ok(());
		}

		// Claiming instead of removing keeps a takeover racing this release
		// from losing its freshly written lease.
		self.claim_lease(&path, &observed)?;

		Ok(())
	}
}
impl RefreshLock for FileLock {
	fn try_acquire(&self, key: LockKey) -> LockFuture<'_, bool> {
		Box::pin(async move { self.try_acquire_now(key) })
	}

	fn release(&self, key: LockKey) -> LockFuture<'_, ()> {
		Box::pin(async move { self.release_now(key) })
	}
}
