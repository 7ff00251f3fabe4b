//! Incremental listing feed: the consumer side of pagination.
//!
//! The feed tracks what has been displayed and which phase it is in. Every
//! filter/sort change calls [`ListingFeed::reset`], which bumps the
//! generation; a load that completes with an older generation is stale and
//! dropped, whatever order results arrive in.

use std::collections::HashSet;

use tracing::debug;

use crate::query::{paginate, Identified, Page};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    Idle,
    Loading,
    Exhausted,
}

/// Issued by [`ListingFeed::begin_load`]; hand it back with the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub offset: usize,
}

#[derive(Debug)]
pub struct ListingFeed<T> {
    page_size: usize,
    generation: u64,
    phase: FeedPhase,
    displayed: Vec<T>,
    displayed_ids: HashSet<String>,
    /// Position in the sorted sequence the next load starts from.
    cursor: usize,
}

impl<T: Identified + Clone> ListingFeed<T> {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            generation: 0,
            phase: FeedPhase::Idle,
            displayed: Vec::new(),
            displayed_ids: HashSet::new(),
            cursor: 0,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn phase(&self) -> FeedPhase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn items(&self) -> &[T] {
        &self.displayed
    }

    pub fn displayed_ids(&self) -> &HashSet<String> {
        &self.displayed_ids
    }

    pub fn has_more(&self) -> bool {
        self.phase != FeedPhase::Exhausted
    }

    /// Start over for a new filter/sort specification. Any in-flight load
    /// becomes stale.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.phase = FeedPhase::Idle;
        self.displayed.clear();
        self.displayed_ids.clear();
        self.cursor = 0;
    }

    /// `Idle → Loading`. Returns `None` while a load is already in flight or
    /// once the feed is exhausted.
    pub fn begin_load(&mut self) -> Option<LoadTicket> {
        if self.phase != FeedPhase::Idle {
            return None;
        }
        self.phase = FeedPhase::Loading;
        Some(LoadTicket { generation: self.generation, offset: self.cursor })
    }

    /// Append a loaded page. Returns false, changing nothing, when the ticket
    /// belongs to an earlier generation.
    pub fn complete(&mut self, ticket: LoadTicket, page: Page<T>) -> bool {
        if ticket.generation != self.generation {
            debug!(
                ticket = ticket.generation,
                current = self.generation,
                "dropping stale page"
            );
            return false;
        }
        for item in page.items {
            if self.displayed_ids.insert(item.id().to_string()) {
                self.displayed.push(item);
            }
        }
        self.cursor = self.cursor.max(page.next_offset);
        self.phase = if page.has_more { FeedPhase::Idle } else { FeedPhase::Exhausted };
        true
    }

    /// A load failed; allow a retry if it is still current.
    pub fn fail(&mut self, ticket: LoadTicket) {
        if ticket.generation == self.generation && self.phase == FeedPhase::Loading {
            self.phase = FeedPhase::Idle;
        }
    }

    /// Load the next page synchronously from an in-memory sorted sequence.
    /// Returns the number of records appended.
    pub fn load_next(&mut self, sorted: &[T]) -> usize {
        let Some(ticket) = self.begin_load() else { return 0 };
        let page = paginate(sorted, self.page_size, ticket.offset, &self.displayed_ids);
        let before = self.displayed.len();
        self.complete(ticket, page);
        self.displayed.len() - before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Hero;

    fn heroes(n: usize) -> Vec<Hero> {
        (0..n).map(|i| Hero::new(i.to_string(), &[])).collect()
    }

    #[test]
    fn loads_until_exhausted() {
        let sorted = heroes(5);
        let mut feed = ListingFeed::new(2);
        assert_eq!(feed.load_next(&sorted), 2);
        assert_eq!(feed.phase(), FeedPhase::Idle);
        assert_eq!(feed.load_next(&sorted), 2);
        assert_eq!(feed.load_next(&sorted), 1);
        assert_eq!(feed.phase(), FeedPhase::Exhausted);
        assert_eq!(feed.load_next(&sorted), 0);
        assert_eq!(feed.items().len(), 5);
    }

    #[test]
    fn one_load_in_flight_at_a_time() {
        let mut feed: ListingFeed<Hero> = ListingFeed::new(8);
        let ticket = feed.begin_load();
        assert!(ticket.is_some());
        assert_eq!(feed.phase(), FeedPhase::Loading);
        assert!(feed.begin_load().is_none());
    }

    #[test]
    fn stale_page_is_discarded_after_reset() {
        let sorted = heroes(3);
        let mut feed = ListingFeed::new(2);
        let stale = feed.begin_load().unwrap();
        feed.reset();

        let page = paginate(&sorted, 2, stale.offset, &HashSet::new());
        assert!(!feed.complete(stale, page));
        assert!(feed.items().is_empty());
        assert_eq!(feed.phase(), FeedPhase::Idle);

        let fresh = feed.begin_load().unwrap();
        let page = paginate(&sorted, 2, fresh.offset, feed.displayed_ids());
        assert!(feed.complete(fresh, page));
        assert_eq!(feed.items().len(), 2);
    }

    #[test]
    fn complete_never_duplicates_displayed_records() {
        let sorted = heroes(3);
        let mut feed = ListingFeed::new(2);
        feed.load_next(&sorted);

        // A server that ignores what we have already shown.
        let ticket = feed.begin_load().unwrap();
        let page = paginate(&sorted, 3, 0, &HashSet::new());
        feed.complete(ticket, page);
        let ids: Vec<&str> = feed.items().iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, ["0", "1", "2"]);
    }

    #[test]
    fn failed_load_returns_to_idle() {
        let mut feed: ListingFeed<Hero> = ListingFeed::new(2);
        let ticket = feed.begin_load().unwrap();
        feed.fail(ticket);
        assert_eq!(feed.phase(), FeedPhase::Idle);
    }
}
