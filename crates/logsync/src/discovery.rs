//! Stream discovery for a group and time window.
//!
//! Streams are listed newest first. Once a stream's last event precedes the
//! window start, every stream after it is at least as old, so discovery stops
//! consuming pages right there. That stream and everything after it are left
//! out whatever their names.

use std::ops::ControlFlow;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::pagination::PaginatedLister;
use crate::progress::ProgressSink;
use crate::traits::LogApi;
use crate::types::{StreamDescriptor, Window};

/// Resolves the streams of a group worth fetching.
#[derive(Clone)]
pub struct StreamDiscovery {
    api: Arc<dyn LogApi>,
    lister: PaginatedLister,
}

impl StreamDiscovery {
    /// Creates a discovery that walks listings with `lister`.
    #[must_use]
    pub fn new(api: Arc<dyn LogApi>, lister: PaginatedLister) -> Self {
        Self { api, lister }
    }

    /// Every group name the account exposes.
    pub async fn list_groups(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        let api = self.api.as_ref();
        self.lister
            .collect(cancel, move |cursor| async move {
                api.list_groups(cursor.as_deref()).await
            })
            .await
    }

    /// Returns true if a group named exactly `group` exists.
    ///
    /// Walks every group page: the listing result cap does not apply here.
    pub async fn group_exists(&self, cancel: &CancellationToken, group: &str) -> Result<bool> {
        let api = self.api.as_ref();
        let mut found = false;
        self.lister
            .for_each_uncapped(
                cancel,
                move |cursor| async move { api.list_groups(cursor.as_deref()).await },
                |name: String| {
                    if name == group {
                        found = true;
                        ControlFlow::Break(())
                    } else {
                        ControlFlow::Continue(())
                    }
                },
            )
            .await?;
        Ok(found)
    }

    /// Finds the streams of `group` whose name contains `name_filter` and
    /// which may hold events inside `window`.
    ///
    /// An empty result is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::GroupNotFound`] if the group does not exist, and
    /// propagates listing failures.
    pub async fn find(
        &self,
        cancel: &CancellationToken,
        group: &str,
        name_filter: &str,
        window: &Window,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<StreamDescriptor>> {
        if !self.group_exists(cancel, group).await? {
            return Err(SyncError::GroupNotFound {
                group: group.to_string(),
            });
        }

        let api = self.api.as_ref();
        let start = window.start();
        let mut matched = Vec::new();
        let end = self
            .lister
            .for_each(
                cancel,
                move |cursor| async move { api.list_streams(group, cursor.as_deref()).await },
                |stream: StreamDescriptor| {
                    progress.stream_seen();
                    if stream.last_event_time < start {
                        debug!(
                            stream = %stream.name,
                            last_event = %stream.last_event_time,
                            "stream older than window, stopping discovery"
                        );
                        return ControlFlow::Break(());
                    }
                    if name_filter.is_empty() || stream.name.contains(name_filter) {
                        debug!(
                            stream = %stream.name,
                            last_event = %stream.last_event_time,
                            "stream matched"
                        );
                        progress.stream_matched();
                        matched.push(stream);
                    }
                    ControlFlow::Continue(())
                },
            )
            .await?;

        info!(group, matched = matched.len(), end = ?end, "stream discovery finished");
        Ok(matched)
    }
}
