//! Partitioned async locks keyed by account.
//!
//! [`PartitionLocker`] hands out one async mutex per key. Holding the lock for one key never
//! blocks another key. Every holder and waiter leases its partition, and the partition is
//! removed when the last lease ends, so the map stays proportional to the accounts currently in
//! contention.

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use async_lock::MutexGuardArc;
// self
use crate::_prelude::*;

#[derive(Debug, Default)]
struct Partition {
	mutex: Arc<AsyncMutex<()>>,
	// Holders plus waiters; only changed while the shard is locked or through `Lease`.
	users: AtomicUsize,
}

/// Lock set providing one mutex per key.
#[derive(Debug)]
pub struct PartitionLocker<K>
where
	K: Eq + Hash,
{
	partitions: Arc<DashMap<K, Partition>>,
}
impl<K> PartitionLocker<K>
where
	K: Clone + Eq + Hash,
{
	/// Waits for the lock of `key` and returns a guard that releases it on drop.
	///
	/// Dropping the returned future while it waits leaves no lock held and no partition behind.
	pub async fn lock(&self, key: &K) -> PartitionGuard<K> {
		let mutex = {
			let partition = self.partitions.entry(key.clone()).or_default();

			partition.users.fetch_add(1, Ordering::AcqRel);

			Arc::clone(&partition.mutex)
		};
		let lease = Lease { key: key.clone(), partitions: self.partitions.clone() };
		let guard = mutex.lock_arc().await;

		PartitionGuard { _guard: guard, lease }
	}

	/// Runs `f` with the lock of `key` held.
	///
	/// The lock is released on every exit path, including panics and cancellation.
	pub async fn with_lock<F, Fut, T>(&self, key: &K, f: F) -> T
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = T>,
	{
		let _guard = self.lock(key).await;

		f().await
	}

	/// Number of partitions currently held or awaited.
	pub fn len(&self) -> usize {
		self.partitions.len()
	}

	/// Returns `true` when no partition is held or awaited.
	pub fn is_empty(&self) -> bool {
		self.partitions.is_empty()
	}
}
impl<K> Default for PartitionLocker<K>
where
	K: Eq + Hash,
{
	fn default() -> Self {
		Self { partitions: Default::default() }
	}
}

/// One holder's or waiter's share of a partition.
struct Lease<K>
where
	K: Eq + Hash,
{
	key: K,
	partitions: Arc<DashMap<K, Partition>>,
}
impl<K> Drop for Lease<K>
where
	K: Eq + Hash,
{
	fn drop(&mut self) {
		// The decrement runs under the shard lock, so a concurrent `lock` either sees the
		// partition before removal or inserts a fresh one.
		self.partitions
			.remove_if(&self.key, |_, partition| partition.users.fetch_sub(1, Ordering::AcqRel) == 1);
	}
}

/// RAII guard for a single partition returned by [`PartitionLocker::lock`].
pub struct PartitionGuard<K>
where
	K: Eq + Hash,
{
	// Declared first so the mutex is released before the lease ends.
	_guard: MutexGuardArc<()>,
	lease: Lease<K>,
}
impl<K> Debug for PartitionGuard<K>
where
	K: Debug + Eq + Hash,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PartitionGuard").field("key", &self.lease.key).finish()
	}
}
