//! Process-local cache of the current secret for each account.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, AccountSecret},
};

/// Thread-safe map from account to its most recently issued secret.
///
/// Entries live in a sharded map, so a writer only excludes readers and writers of the
/// shard holding its account. Clones share the same entries.
#[derive(Clone, Debug, Default)]
pub struct TokenCache(Arc<DashMap<AccountId, AccountSecret>>);
impl TokenCache {
	/// Returns a copy of the cached secret for `account`, if any.
	pub fn get(&self, account: &AccountId) -> Option<AccountSecret> {
		self.0.get(account).map(|entry| entry.value().clone())
	}

	/// Stores `secret` as the current secret for `account`.
	pub fn set(&self, account: AccountId, secret: AccountSecret) {
		self.0.insert(account, secret);
	}

	/// Evicts the cached secret for `account`, returning it when present.
	pub fn invalidate(&self, account: &AccountId) -> Option<AccountSecret> {
		self.0.remove(account).map(|(_, secret)| secret)
	}

	/// Returns `true` when a secret is cached for `account`.
	pub fn contains(&self, account: &AccountId) -> bool {
		self.0.contains_key(account)
	}

	/// Number of cached accounts.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when no account is cached.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
