//! The seam between the orchestrator and wherever update info comes from.

use super::model::AvailableUpdate;
use anyhow::Result;
use std::future::Future;

/// Something that can answer "is there an update for this binary".
///
/// Implemented by [`Checker`](super::checker::Checker), which asks the info
/// endpoint directly, and by
/// [`UpdateCacheHandle`](super::cache::UpdateCacheHandle), which answers from the
/// background cache. The orchestrator bounds every call with its own deadline.
pub trait UpdateInfoProvider: Send + Sync {
    /// The update that should replace the running binary, if any.
    fn current_update(&self) -> impl Future<Output = Result<Option<AvailableUpdate>>> + Send;
}
