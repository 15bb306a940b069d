//! Cursor pagination walker with depth and result bounds.
//!
//! Listing calls are walked iteratively with an explicit depth counter and a
//! set of cursors already requested. A walk ends when:
//! - the server returns no continuation cursor,
//! - the accumulated item count reaches the result cap (warning, not an error),
//! - the server hands back a cursor it already returned,
//! - the visitor asks to stop,
//!
//! and fails with [`SyncError::PaginationExceeded`] once the depth cap is passed.

use std::collections::HashSet;
use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::{ApiError, Result, SyncError};
use crate::rate_limit::RateLimiter;
use crate::types::Page;

/// How a successful walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEnd {
    /// The last page carried no cursor.
    Exhausted,
    /// The result cap was reached; remaining pages were not requested.
    ResultCap,
    /// The server repeated a cursor.
    CursorRepeated,
    /// The visitor stopped the walk.
    Stopped,
}

/// Walks cursor-paginated listing calls under the listing rate limit.
#[derive(Debug, Clone)]
pub struct PaginatedLister {
    limiter: Arc<RateLimiter>,
    max_depth: usize,
    max_results: usize,
}

impl PaginatedLister {
    /// Creates a lister gated by `limiter`.
    #[must_use]
    pub fn new(limiter: Arc<RateLimiter>, max_depth: usize, max_results: usize) -> Self {
        Self {
            limiter,
            max_depth,
            max_results,
        }
    }

    /// Creates a lister with the caps from `config`.
    #[must_use]
    pub fn from_config(limiter: Arc<RateLimiter>, config: &SyncConfig) -> Self {
        Self::new(
            limiter,
            config.max_pagination_depth,
            config.max_listing_results,
        )
    }

    /// Calls `fetch` page after page, handing every item to `visit`.
    ///
    /// `fetch` receives `None` for the first page and the previous page's
    /// cursor afterwards. Errors from `fetch` propagate without retry.
    pub async fn for_each<T, F, Fut, V>(
        &self,
        cancel: &CancellationToken,
        fetch: F,
        visit: V,
    ) -> Result<WalkEnd>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = std::result::Result<Page<T>, ApiError>>,
        V: FnMut(T) -> ControlFlow<()>,
    {
        self.walk(cancel, Some(self.max_results), fetch, visit).await
    }

    /// Like [`PaginatedLister::for_each`], but never truncates at the result
    /// cap.
    ///
    /// For lookups whose answer would be wrong if cut short. The depth cap,
    /// the repeated-cursor stop and the rate limit still apply.
    pub async fn for_each_uncapped<T, F, Fut, V>(
        &self,
        cancel: &CancellationToken,
        fetch: F,
        visit: V,
    ) -> Result<WalkEnd>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = std::result::Result<Page<T>, ApiError>>,
        V: FnMut(T) -> ControlFlow<()>,
    {
        self.walk(cancel, None, fetch, visit).await
    }

    async fn walk<T, F, Fut, V>(
        &self,
        cancel: &CancellationToken,
        cap: Option<usize>,
        mut fetch: F,
        mut visit: V,
    ) -> Result<WalkEnd>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = std::result::Result<Page<T>, ApiError>>,
        V: FnMut(T) -> ControlFlow<()>,
    {
        let cap = cap.unwrap_or(usize::MAX);
        let mut cursor: Option<String> = None;
        let mut seen: HashSet<String> = HashSet::new();
        let mut count = 0usize;
        let mut depth = 0usize;

        loop {
            if depth > self.max_depth {
                return Err(SyncError::PaginationExceeded { depth });
            }
            depth += 1;

            self.limiter.acquire(cancel).await?;
            let page = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(SyncError::Cancelled),
                page = fetch(cursor.take()) => page?,
            };
            debug!(
                limiter = self.limiter.name(),
                depth,
                items = page.items.len(),
                more = page.next_cursor.is_some(),
                "listing page"
            );

            let page_len = page.items.len();
            for (i, item) in page.items.into_iter().enumerate() {
                if count >= cap {
                    warn!(
                        cap,
                        dropped = page_len - i,
                        "listing result cap reached"
                    );
                    return Ok(WalkEnd::ResultCap);
                }
                count += 1;
                if visit(item).is_break() {
                    return Ok(WalkEnd::Stopped);
                }
            }

            let Some(next) = page.next_cursor else {
                return Ok(WalkEnd::Exhausted);
            };
            if count >= cap {
                warn!(cap, "listing result cap reached");
                return Ok(WalkEnd::ResultCap);
            }
            if !seen.insert(next.clone()) {
                debug!(cursor = %next, "cursor repeated, ending walk");
                return Ok(WalkEnd::CursorRepeated);
            }
            cursor = Some(next);
        }
    }

    /// Accumulates every item of the walk.
    pub async fn collect<T, F, Fut>(&self, cancel: &CancellationToken, fetch: F) -> Result<Vec<T>>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = std::result::Result<Page<T>, ApiError>>,
    {
        let mut items = Vec::new();
        self.for_each(cancel, fetch, |item| {
            items.push(item);
            ControlFlow::Continue(())
        })
        .await?;
        Ok(items)
    }
}
