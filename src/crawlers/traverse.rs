//! Breadth-first traversal from search seeds
//!
//! Seeds start at depth 1. Links found on a successfully fetched page are
//! queued one level deeper until `max_depth` is reached. The traversal stops
//! once `max_pages` pages (failed ones included) have been recorded, the
//! queue runs dry, or the optional deadline passes.

use crate::crawlers::Fetcher;
use crate::filter::normalize_url;
use crate::results::PageData;
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};
use url::Url;

/// Bounds on a single traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalLimits {
    /// Seeds are depth 1; pages at this depth are not expanded
    pub max_depth: usize,
    /// Total pages recorded, failures included
    pub max_pages: usize,
    /// Stop starting new fetches after this long
    pub deadline: Option<Duration>,
}

impl TraversalLimits {
    pub fn new(max_depth: usize, max_pages: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
            max_pages,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }
}

/// A URL waiting to be visited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: Url,
    pub depth: usize,
}

/// Visit seeds and their links breadth-first within `limits`
///
/// Every URL is fetched at most once per traversal. Pages are returned in
/// visit order.
pub async fn traverse<F: Fetcher>(fetcher: &F, seeds: &[Url], limits: TraversalLimits) -> Vec<PageData> {
    let started = Instant::now();
    let mut queue: VecDeque<FrontierEntry> = seeds
        .iter()
        .map(|url| FrontierEntry {
            url: normalize_url(url),
            depth: 1,
        })
        .collect();
    let mut visited = HashSet::new();
    let mut pages = Vec::new();

    while pages.len() < limits.max_pages {
        let Some(entry) = queue.pop_front() else {
            break;
        };

        if let Some(deadline) = limits.deadline {
            if started.elapsed() >= deadline {
                ::log::info!(
                    "Traversal deadline of {:?} reached after {} pages",
                    deadline,
                    pages.len()
                );
                break;
            }
        }

        // The same URL can be queued from several pages before its first visit
        if !visited.insert(entry.url.to_string()) {
            ::log::trace!("Skipping already visited: {}", entry.url);
            continue;
        }

        let page = fetcher.fetch(&entry.url).await;

        if entry.depth < limits.max_depth && !page.is_error() {
            let mut queued = 0;
            for link in &page.links {
                let Ok(url) = Url::parse(&link.url) else {
                    continue;
                };
                let url = normalize_url(&url);
                if visited.contains(url.as_str()) {
                    continue;
                }
                queue.push_back(FrontierEntry {
                    url,
                    depth: entry.depth + 1,
                });
                queued += 1;
            }
            ::log::debug!(
                "Queued {} links from {} at depth {}",
                queued,
                entry.url,
                entry.depth + 1
            );
        }

        pages.push(page);
    }

    ::log::info!(
        "Traversal finished: {} pages in {:.2} seconds",
        pages.len(),
        started.elapsed().as_secs_f64()
    );
    pages
}
