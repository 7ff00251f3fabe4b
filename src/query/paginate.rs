use std::collections::HashSet;

use serde::Serialize;

use crate::types::Hero;

/// Records the paginator can deduplicate.
pub trait Identified {
    fn id(&self) -> &str;
}

impl Identified for Hero {
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
    /// Position in the sorted sequence just past the last record examined.
    pub next_offset: usize,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self { items: Vec::new(), has_more: false, next_offset: 0 }
    }
}

/// Next page of up to `page_size` records starting at `displayed_count`,
/// skipping any id already in `displayed_ids`.
///
/// Skipped duplicates do not count toward the page, so a reordered re-run can
/// never stall the consumer on an empty page while `has_more` stays true.
/// Without duplicates `has_more == displayed_count + items.len() < sorted.len()`.
/// A `page_size` of zero is treated as one.
pub fn paginate<T: Identified + Clone>(
    sorted: &[T],
    page_size: usize,
    displayed_count: usize,
    displayed_ids: &HashSet<String>,
) -> Page<T> {
    let page_size = page_size.max(1);
    let mut items = Vec::with_capacity(page_size.min(sorted.len()));
    let mut picked: HashSet<&str> = HashSet::new();
    let mut cursor = displayed_count.min(sorted.len());

    while cursor < sorted.len() && items.len() < page_size {
        let record = &sorted[cursor];
        cursor += 1;
        let id = record.id();
        if displayed_ids.contains(id) || !picked.insert(id) {
            continue;
        }
        items.push(record.clone());
    }

    Page { has_more: cursor < sorted.len(), next_offset: cursor, items }
}
