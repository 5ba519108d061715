//! One page of fetched items and the pagination cursor that comes with it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque pagination token returned by the source system.
///
/// We never look inside it; it is stored as-is and handed back to the fetcher
/// to resume after the item it belonged to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Cursor {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A single fetched item ("edge") together with its cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageItem {
    pub item: serde_json::Value,
    pub cursor: Cursor,
}

impl PageItem {
    pub fn new(item: serde_json::Value, cursor: impl Into<Cursor>) -> Self {
        Self {
            item,
            cursor: cursor.into(),
        }
    }
}

/// Ordered items of one page. An empty page means the walk is over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultPage {
    items: Vec<PageItem>,
}

impl ResultPage {
    pub fn new(items: Vec<PageItem>) -> Self {
        Self { items }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[PageItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Cursor to resume from: the cursor of the last item, if any.
    pub fn last_cursor(&self) -> Option<&Cursor> {
        self.items.last().map(|edge| &edge.cursor)
    }
}

impl FromIterator<PageItem> for ResultPage {
    fn from_iter<I: IntoIterator<Item = PageItem>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn last_cursor_is_cursor_of_last_item() {
        let page: ResultPage = vec![
            PageItem::new(json!({"number": 1}), "c1"),
            PageItem::new(json!({"number": 2}), "c2"),
        ]
        .into_iter()
        .collect();

        assert_eq!(page.len(), 2);
        assert_eq!(page.last_cursor(), Some(&Cursor::new("c2")));
    }

    #[test]
    fn empty_page_has_no_cursor() {
        let page = ResultPage::empty();
        assert!(page.is_empty());
        assert_eq!(page.last_cursor(), None);
    }
}
