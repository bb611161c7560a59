use std::collections::{HashSet, VecDeque};
use url::Url;

/// A URL waiting to be fetched, with its link distance from the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: Url,
    pub depth: usize,
}

/// FIFO queue of pending URLs plus the set already visited.
///
/// A URL is queued at most once and visited at most once, which bounds a
/// crawl over any finite link graph.
#[derive(Debug, Default)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    queued: HashSet<String>,
    visited: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: Url) -> Self {
        let mut frontier = Self::new();
        frontier.push(root, 0);
        frontier
    }

    /// Queue `url` unless it was already visited or is already waiting.
    pub fn push(&mut self, url: Url, depth: usize) -> bool {
        let key = url.as_str().to_string();
        if self.visited.contains(&key) || self.queued.contains(&key) {
            return false;
        }
        self.queued.insert(key);
        self.queue.push_back(FrontierEntry { url, depth });
        true
    }

    /// Pop the oldest entry that has not been visited and mark it visited.
    pub fn pop(&mut self) -> Option<FrontierEntry> {
        while let Some(entry) = self.queue.pop_front() {
            let key = entry.url.as_str().to_string();
            self.queued.remove(&key);
            if self.visited.insert(key) {
                return Some(entry);
            }
        }
        None
    }

    /// Mark a URL visited without fetching it, e.g. a redirect target.
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(url.as_str().to_string())
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(url.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse("http://example.com").unwrap().join(path).unwrap()
    }

    #[test]
    fn test_fifo_order() {
        let mut frontier = Frontier::with_root(url("/"));
        frontier.push(url("/a"), 1);
        frontier.push(url("/b"), 1);

        let order: Vec<_> = std::iter::from_fn(|| frontier.pop())
            .map(|e| e.url.path().to_string())
            .collect();
        assert_eq!(order, vec!["/", "/a", "/b"]);
    }

    #[test]
    fn test_no_duplicate_queueing() {
        let mut frontier = Frontier::new();
        assert!(frontier.push(url("/a"), 0));
        assert!(!frontier.push(url("/a"), 3));
        assert_eq!(frontier.pending(), 1);

        let entry = frontier.pop().unwrap();
        assert_eq!(entry.depth, 0);
        // Visited URLs are never queued again
        assert!(!frontier.push(url("/a"), 1));
        assert!(frontier.pop().is_none());
    }

    #[test]
    fn test_mark_visited_blocks_push() {
        let mut frontier = Frontier::new();
        assert!(frontier.mark_visited(&url("/moved")));
        assert!(!frontier.push(url("/moved"), 1));
        assert!(frontier.is_visited(&url("/moved")));
        assert_eq!(frontier.visited_count(), 1);
    }

    #[test]
    fn test_visited_while_queued_is_skipped() {
        let mut frontier = Frontier::new();
        frontier.push(url("/a"), 1);
        frontier.push(url("/b"), 1);
        frontier.mark_visited(&url("/a"));

        assert_eq!(frontier.pop().unwrap().url.path(), "/b");
        assert!(frontier.is_empty());
    }
}
