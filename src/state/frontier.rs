use crate::url::CanonicalUrl;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

/// Breadth-first queue of pages plus the set of pages already dequeued
///
/// A URL is marked visited when it is dequeued, before its page is processed,
/// so a link discovered while that page is still in flight cannot be queued a
/// second time.
#[derive(Debug, Default)]
pub struct Frontier {
    inner: Mutex<FrontierInner>,
}

#[derive(Debug, Default)]
struct FrontierInner {
    queue: VecDeque<CanonicalUrl>,
    queued: HashSet<CanonicalUrl>,
    visited: HashSet<CanonicalUrl>,
    visit_order: Vec<CanonicalUrl>,
}

impl Frontier {
    /// Frontier holding only `seed`
    pub fn with_seed(seed: CanonicalUrl) -> Self {
        let frontier = Self::default();
        frontier.push(seed);
        frontier
    }

    /// Appends `url` unless it was already visited or is already queued
    ///
    /// Returns true if the URL was added.
    pub fn push(&self, url: CanonicalUrl) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.visited.contains(&url) || inner.queued.contains(&url) {
            return false;
        }
        inner.queued.insert(url.clone());
        inner.queue.push_back(url);
        true
    }

    /// Takes the next URL and marks it visited
    pub fn pop(&self) -> Option<CanonicalUrl> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let url = inner.queue.pop_front()?;
        inner.queued.remove(&url);
        inner.visited.insert(url.clone());
        inner.visit_order.push(url.clone());
        Some(url)
    }

    /// Number of URLs waiting to be visited
    pub fn pending(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }

    /// Visited URLs in the order they were dequeued
    pub fn visited(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.visit_order.iter().map(|u| u.to_string()).collect()
    }
}
