//! Page elements the guest can write markup into.

use std::collections::BTreeMap;

use tilebridge_types::{BridgeError, BridgeResult};

/// A document with addressable elements.
pub trait Document {
    /// Replace the markup of element `id`. Unknown ids are an error.
    fn set_inner_html(&mut self, id: &str, html: &str) -> BridgeResult<()>;
}

/// A flat set of elements keyed by id, each holding its markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementRegistry {
    elements: BTreeMap<String, String>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with an empty element for every id in `ids`.
    pub fn with_elements<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            elements: ids.into_iter().map(|id| (id.into(), String::new())).collect(),
        }
    }

    /// Add an empty element. An existing element keeps its markup.
    pub fn insert(&mut self, id: impl Into<String>) {
        self.elements.entry(id.into()).or_default();
    }

    pub fn inner_html(&self, id: &str) -> Option<&str> {
        self.elements.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl Document for ElementRegistry {
    fn set_inner_html(&mut self, id: &str, html: &str) -> BridgeResult<()> {
        let slot = self
            .elements
            .get_mut(id)
            .ok_or_else(|| BridgeError::MissingElement(id.to_string()))?;
        slot.clear();
        slot.push_str(html);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_inner_html_replaces_markup() {
        let mut doc = ElementRegistry::with_elements(["score"]);
        doc.set_inner_html("score", "<b>1</b>").unwrap();
        doc.set_inner_html("score", "<b>2</b>").unwrap();
        assert_eq!(doc.inner_html("score"), Some("<b>2</b>"));
    }

    #[test]
    fn test_unknown_element_is_error() {
        let mut doc = ElementRegistry::new();
        let err = doc.set_inner_html("nope", "x").unwrap_err();
        assert!(matches!(err, BridgeError::MissingElement(ref id) if id == "nope"));
    }

    #[test]
    fn test_insert_keeps_existing_markup() {
        let mut doc = ElementRegistry::with_elements(["a"]);
        doc.set_inner_html("a", "kept").unwrap();
        doc.insert("a");
        doc.insert("b");
        assert_eq!(doc.inner_html("a"), Some("kept"));
        assert_eq!(doc.inner_html("b"), Some(""));
        assert_eq!(doc.len(), 2);
    }
}
