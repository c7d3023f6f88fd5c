use indexmap::IndexMap;
use serde_json::Value;

/// Per-ToolInvocation ordered cache of fetched pages.
/// Lives only for the viewing session; never persisted. Indices form a
/// contiguous range `[1..k]` at all times — enforced by `push_page`, which
/// is the only way to add entries.
#[derive(Debug, Clone, Default)]
pub struct PageCache {
    pages: IndexMap<u32, Vec<Value>>,
    pub cursor: Option<String>,
    pub has_more: bool,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Append a newly-fetched page at `cachedPages + 1`.
    pub fn push_page(&mut self, data: Vec<Value>, cursor: Option<String>, has_more: bool) -> u32 {
        let next_index = self.pages.len() as u32 + 1;
        self.pages.insert(next_index, data);
        self.cursor = cursor;
        self.has_more = has_more;
        next_index
    }

    /// Returns the cached page at 1-based index `k`, if present.
    pub fn view_page(&self, k: u32) -> Option<&[Value]> {
        self.pages.get(&k).map(Vec::as_slice)
    }

    /// `viewAll()` — concatenates all cached pages in index order.
    pub fn view_all(&self) -> Vec<Value> {
        let mut keys: Vec<&u32> = self.pages.keys().collect();
        keys.sort_unstable();
        keys.into_iter()
            .flat_map(|k| self.pages[k].iter().cloned())
            .collect()
    }

    /// Asserts the contiguity invariant: cached page indices form `[1..k]`
    /// with no gaps. Always holds given `push_page` is the sole mutator, but exposed for
    /// tests and for the `/tools/paginate` handler's defensive checks.
    pub fn is_contiguous(&self) -> bool {
        let mut keys: Vec<&u32> = self.pages.keys().collect();
        keys.sort_unstable();
        keys.iter().enumerate().all(|(i, &&k)| k == i as u32 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn starts_empty() {
        let cache = PageCache::new();
        assert!(cache.is_empty());
        assert!(cache.is_contiguous());
    }

    #[test]
    fn push_and_view() {
        let mut cache = PageCache::new();
        let idx1 = cache.push_page(vec![json!({"id": "a"}), json!({"id": "b"})], Some("b".into()), true);
        assert_eq!(idx1, 1);
        let idx2 = cache.push_page(vec![json!({"id": "c"}), json!({"id": "d"})], Some("d".into()), false);
        assert_eq!(idx2, 2);

        assert_eq!(cache.view_page(1).unwrap().len(), 2);
        assert_eq!(cache.view_all().len(), 4);
        assert!(cache.is_contiguous());
        assert!(!cache.has_more);
    }

    #[test]
    fn view_missing_page_is_none() {
        let cache = PageCache::new();
        assert!(cache.view_page(1).is_none());
    }

    #[test]
    fn view_all_preserves_order() {
        let mut cache = PageCache::new();
        cache.push_page(vec![json!(1), json!(2)], None, true);
        cache.push_page(vec![json!(3)], None, false);
        assert_eq!(cache.view_all(), vec![json!(1), json!(2), json!(3)]);
    }
}
