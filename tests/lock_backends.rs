// std
use std::{env, fs, path::PathBuf, process, time::UNIX_EPOCH};
// crates.io
use time::Duration;
use tokio::time::sleep;
// self
use oauth2_coordinator::lock::{FileLock, LockKey, MemoryLock, RefreshLock};

fn temp_lock_dir(tag: &str) -> PathBuf {
	let nanos = UNIX_EPOCH.elapsed().map(|elapsed| elapsed.subsec_nanos()).unwrap_or_default();

	env::temp_dir().join(format!("oauth2_coordinator_{tag}_{}_{nanos}", process::id()))
}

#[tokio::test]
async fn memory_lock_is_mutually_exclusive() {
	let lock = MemoryLock::default();
	let contender = lock.clone();
	let key = LockKey::new(42);

	assert!(lock.try_acquire(key).await.expect("First acquisition should succeed."));
	assert!(!contender.try_acquire(key).await.expect("Second acquisition should be refused."));
	// An unrelated key is not affected by the held one.
	assert!(contender.try_acquire(LockKey::new(43)).await.expect("Probing should succeed."));

	lock.release(key).await.expect("Releasing the held key should succeed.");

	assert!(contender.try_acquire(key).await.expect("Reacquisition should succeed."));
}

#[tokio::test]
async fn memory_lock_release_is_idempotent() {
	let lock = MemoryLock::default();
	let key = LockKey::new(7);

	lock.release(key).await.expect("Releasing an unheld key should succeed.");
	assert!(lock.try_acquire(key).await.expect("Acquisition should succeed."));
	lock.release(key).await.expect("Releasing should succeed.");
	lock.release(key).await.expect("Releasing twice should still succeed.");
}

#[tokio::test]
async fn memory_lock_reclaims_lapsed_leases() {
	let lock = MemoryLock::default().with_lease_ttl(Duration::milliseconds(50));
	let key = LockKey::new(4004);

	assert!(lock.try_acquire(key).await.expect("Acquisition should succeed."));
	assert!(!lock.try_acquire(key).await.expect("A live lease should be refused."));

	sleep(std::time::Duration::from_millis(120)).await;

	// The holder never released, as after an abandoned call; the key frees
	// itself once the lease lapses.
	assert!(lock.try_acquire(key).await.expect("Reclaiming the lapsed lease should succeed."));
}

#[tokio::test]
async fn file_lock_excludes_other_handles() {
	let dir = temp_lock_dir("exclusive");
	let holder = FileLock::open(&dir).expect("Opening the first lock handle should succeed.");
	let contender = FileLock::open(&dir).expect("Opening the second lock handle should succeed.");
	let key = LockKey::for_provider(&"fleet-provider".parse().expect("Provider should parse."));

	assert!(holder.try_acquire(key).await.expect("First acquisition should succeed."));
	assert!(!contender.try_acquire(key).await.expect("Second acquisition should be refused."));

	holder.release(key).await.expect("Releasing the held lease should succeed.");

	assert!(contender.try_acquire(key).await.expect("Reacquisition should succeed."));

	fs::remove_dir_all(&dir).expect("Removing the lock fixture directory should succeed.");
}

#[tokio::test]
async fn file_lock_ignores_foreign_releases() {
	let dir = temp_lock_dir("foreign");
	let holder = FileLock::open(&dir).expect("Opening the first lock handle should succeed.");
	let stranger = FileLock::open(&dir).expect("Opening the second lock handle should succeed.");
	let key = LockKey::new(1001);

	assert!(holder.try_acquire(key).await.expect("Acquisition should succeed."));

	// A release from a non-holder succeeds without touching the lease.
	stranger.release(key).await.expect("Foreign release should be a no-op success.");

	assert!(!stranger.try_acquire(key).await.expect("The lease should still be held."));

	holder.release(key).await.expect("Releasing the held lease should succeed.");
	fs::remove_dir_all(&dir).expect("Removing the lock fixture directory should succeed.");
}

#[tokio::test]
async fn file_lock_takes_over_expired_leases() {
	let dir = temp_lock_dir("expired");
	let fragile = FileLock::open(&dir)
		.expect("Opening the first lock handle should succeed.")
		.with_lease_ttl(Duration::milliseconds(50));
	let successor = FileLock::open(&dir).expect("Opening the second lock handle should succeed.");
	let key = LockKey::new(2002);

	assert!(fragile.try_acquire(key).await.expect("Acquisition should succeed."));

	sleep(std::time::Duration::from_millis(120)).await;

	// The lease expired without a release, as after a crash; the next
	// contender claims it.
	assert!(successor.try_acquire(key).await.expect("Takeover should succeed."));
	assert!(!fragile.try_acquire(key).await.expect("The old holder should now be refused."));

	successor.release(key).await.expect("Releasing the claimed lease should succeed.");
	fs::remove_dir_all(&dir).expect("Removing the lock fixture directory should succeed.");
}

#[tokio::test]
async fn file_lock_release_is_idempotent() {
	let dir = temp_lock_dir("idempotent");
	let lock = FileLock::open(&dir).expect("Opening the lock handle should succeed.");
	let key = LockKey::new(3003);

	lock.release(key).await.expect("Releasing an unheld key should succeed.");
	assert!(lock.try_acquire(key).await.expect("Acquisition should succeed."));
	lock.release(key).await.expect("Releasing should succeed.");
	lock.release(key).await.expect("Releasing twice should still succeed.");
	assert!(lock.try_acquire(key).await.expect("Reacquisition should succeed."));

	lock.release(key).await.expect("Final release should succeed.");
	fs::remove_dir_all(&dir).expect("Removing the lock fixture directory should succeed.");
}
