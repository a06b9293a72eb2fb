//! Search filter
//!
//! Plain case-insensitive substring containment over content, tags and type
//! name. No tokenizing, no fuzzy matching, no re-ranking: matches keep the
//! collection's newest-first order.

use crate::models::ContentItem;
use crate::slot::Slot;
use parking_lot::Mutex;
use std::sync::Arc;

/// Items matching `query`, in their original order.
/// An empty query returns everything; whitespace is not trimmed.
pub fn filter(items: &[ContentItem], query: &str) -> Vec<ContentItem> {
    if query.is_empty() {
        return items.to_vec();
    }
    let needle = query.to_lowercase();
    items
        .iter()
        .filter(|item| item.matches_query(&needle))
        .cloned()
        .collect()
}

struct Memo {
    items_revision: u64,
    query_revision: u64,
    visible: Arc<[ContentItem]>,
}

/// Memoized visible subset. Recomputed only when the collection or the query
/// slot has changed since the last call.
#[derive(Default)]
pub(crate) struct VisibleItems {
    memo: Mutex<Option<Memo>>,
}

impl VisibleItems {
    pub(crate) fn get(&self, items: &Slot<Vec<ContentItem>>, query: &Slot<String>) -> Arc<[ContentItem]> {
        let (query, query_revision) = query.snapshot(|q, rev| (q.clone(), rev));

        items.snapshot(|items, items_revision| {
            let mut memo = self.memo.lock();
            if let Some(m) = memo.as_ref() {
                if m.items_revision == items_revision && m.query_revision == query_revision {
                    return Arc::clone(&m.visible);
                }
            }

            let visible: Arc<[ContentItem]> = filter(items, &query).into();
            *memo = Some(Memo {
                items_revision,
                query_revision,
                visible: Arc::clone(&visible),
            });
            visible
        })
    }
}
