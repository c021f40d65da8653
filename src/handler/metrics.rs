// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::control_plane::TokenAction;

/// Thread-safe counters for handler activity.
#[derive(Debug, Default)]
pub struct HandlerMetrics {
	fetches: AtomicU64,
	refreshes: AtomicU64,
	cache_hits: AtomicU64,
	failures: AtomicU64,
	status_toggles: AtomicU64,
}
impl HandlerMetrics {
	/// Number of token fetches sent to the control plane.
	pub fn control_plane_fetches(&self) -> u64 {
		self.fetches.load(Ordering::Relaxed)
	}

	/// Number of token refreshes sent to the control plane.
	pub fn control_plane_refreshes(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Number of fetch/refresh calls answered from the cache.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Number of failed control-plane interactions.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Number of status updates sent to the control plane.
	pub fn status_toggles(&self) -> u64 {
		self.status_toggles.load(Ordering::Relaxed)
	}

	pub(crate) fn record_control_plane_call(&self, action: TokenAction) {
		match action {
			TokenAction::Fetch => self.fetches.fetch_add(1, Ordering::Relaxed),
			TokenAction::Refresh => self.refreshes.fetch_add(1, Ordering::Relaxed),
		};
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_status_toggle(&self) {
		self.status_toggles.fetch_add(1, Ordering::Relaxed);
	}
}
