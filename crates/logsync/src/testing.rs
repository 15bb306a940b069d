//! Scripted in-process [`LogApi`] for unit tests.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

use crate::error::ApiError;
use crate::traits::{ApiResult, LogApi};
use crate::types::{Page, RawEvent, StreamDescriptor, Window};

pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

/// Builds a forwarder envelope for `pod`.
pub(crate) fn envelope(pod: &str, line: &str) -> String {
    serde_json::json!({
        "log": format!("{line}\n"),
        "stream": "stdout",
        "kubernetes": {
            "pod_name": pod,
            "container_name": "app",
            "namespace_name": "default",
        }
    })
    .to_string()
}

/// How a stream answers event requests.
#[derive(Debug, Clone)]
pub(crate) enum EventScript {
    /// Serves pages in order, then an empty page echoing the cursor.
    Pages(Vec<Vec<RawEvent>>),
    /// Always one event and a fresh cursor.
    Endless,
    /// Cursors go a, b, a, b, ...
    Cycle,
    /// Every call fails.
    Fail(String),
}

#[derive(Default)]
pub(crate) struct FakeApi {
    groups: Vec<Vec<String>>,
    streams: HashMap<String, Vec<Vec<StreamDescriptor>>>,
    events: HashMap<String, EventScript>,
    event_delay: Duration,
    group_calls: AtomicUsize,
    stream_calls: AtomicUsize,
    event_calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn page_index(cursor: Option<&str>) -> usize {
    cursor
        .and_then(|c| c.trim_start_matches(|ch: char| !ch.is_ascii_digit()).parse().ok())
        .unwrap_or(0)
}

impl FakeApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_groups(mut self, pages: Vec<Vec<&str>>) -> Self {
        self.groups = pages
            .into_iter()
            .map(|p| p.into_iter().map(ToString::to_string).collect())
            .collect();
        self
    }

    pub(crate) fn with_stream_pages(
        mut self,
        group: &str,
        pages: Vec<Vec<StreamDescriptor>>,
    ) -> Self {
        self.streams.insert(group.to_string(), pages);
        self
    }

    pub(crate) fn with_events(mut self, stream: &str, script: EventScript) -> Self {
        self.events.insert(stream.to_string(), script);
        self
    }

    pub(crate) fn with_event_delay(mut self, delay: Duration) -> Self {
        self.event_delay = delay;
        self
    }

    pub(crate) fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn event_calls(&self, stream: &str) -> usize {
        self.event_calls.lock().get(stream).copied().unwrap_or(0)
    }

    pub(crate) fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn events_page(&self, stream: &str, cursor: Option<&str>) -> ApiResult<Page<RawEvent>> {
        let idx = page_index(cursor);
        match self.events.get(stream) {
            None => Ok(Page::last(Vec::new())),
            Some(EventScript::Pages(pages)) => match pages.get(idx) {
                Some(items) => Ok(Page::new(items.clone(), Some(format!("f{}", idx + 1)))),
                None => Ok(Page::new(Vec::new(), cursor.map(ToString::to_string))),
            },
            Some(EventScript::Endless) => Ok(Page::new(
                vec![RawEvent::new(idx as i64, envelope("endless", "tick"))],
                Some(format!("f{}", idx + 1)),
            )),
            Some(EventScript::Cycle) => {
                let next = if cursor == Some("a") { "b" } else { "a" };
                Ok(Page::new(
                    vec![RawEvent::new(0, envelope("cycle", "tick"))],
                    Some(next.to_string()),
                ))
            }
            Some(EventScript::Fail(msg)) => Err(ApiError::Transport(msg.clone())),
        }
    }
}

impl LogApi for FakeApi {
    fn list_groups<'a>(
        &'a self,
        cursor: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = ApiResult<Page<String>>> + Send + 'a>> {
        Box::pin(async move {
            self.group_calls.fetch_add(1, Ordering::SeqCst);
            let idx = page_index(cursor);
            let items = self.groups.get(idx).cloned().unwrap_or_default();
            let next = (idx + 1 < self.groups.len()).then(|| format!("g{}", idx + 1));
            Ok(Page::new(items, next))
        })
    }

    fn list_streams<'a>(
        &'a self,
        group: &'a str,
        cursor: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = ApiResult<Page<StreamDescriptor>>> + Send + 'a>> {
        Box::pin(async move {
            self.stream_calls.fetch_add(1, Ordering::SeqCst);
            let pages = self.streams.get(group).cloned().unwrap_or_default();
            let idx = page_index(cursor);
            let items = pages.get(idx).cloned().unwrap_or_default();
            let next = (idx + 1 < pages.len()).then(|| format!("s{}", idx + 1));
            Ok(Page::new(items, next))
        })
    }

    fn list_events<'a>(
        &'a self,
        _group: &'a str,
        stream: &'a str,
        _window: &'a Window,
        cursor: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = ApiResult<Page<RawEvent>>> + Send + 'a>> {
        Box::pin(async move {
            *self.event_calls.lock().entry(stream.to_string()).or_default() += 1;
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let _guard = InFlight(&self.in_flight);
            if !self.event_delay.is_zero() {
                tokio::time::sleep(self.event_delay).await;
            }
            self.events_page(stream, cursor)
        })
    }
}
