//! Generic recursive feed element.
//!
//! Several "simple" feed elements (a DRM licensor block, a patron block,
//! a series statement) carry open-ended attribute sets that a serializer
//! should be able to walk without knowing every possible tag in advance.
//! Instead of a dynamic attribute bag, the tree is a tagged variant:
//! every attribute value is a scalar, a nested node, or an ordered list
//! of nodes.

/// A value held by one attribute of a [`FeedEntryNode`].
#[derive(Debug, Clone, PartialEq)]
pub enum FeedValue {
    Scalar(String),
    Node(FeedEntryNode),
    List(Vec<FeedEntryNode>),
}

impl FeedValue {
    pub fn scalar(value: impl Into<String>) -> FeedValue {
        FeedValue::Scalar(value.into())
    }

    /// Get the scalar value, if this is a scalar.
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            FeedValue::Scalar(s) => Some(s),
            _ => None,
        }
    }
}

/// An ordered, uniquely-named attribute set plus optional element text.
///
/// Attribute names are unique within one node; setting a name twice
/// replaces the earlier value. Insertion order is preserved because the
/// XML serializer emits children in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntryNode {
    pub text: Option<String>,
    attributes: Vec<(String, FeedValue)>,
}

impl FeedEntryNode {
    pub fn new() -> FeedEntryNode {
        FeedEntryNode::default()
    }

    /// A node holding only element text.
    pub fn with_text(text: impl Into<String>) -> FeedEntryNode {
        FeedEntryNode {
            text: Some(text.into()),
            attributes: Vec::new(),
        }
    }

    /// Set an attribute, replacing any existing value under the same name.
    pub fn set(&mut self, name: impl Into<String>, value: FeedValue) {
        let name = name.into();
        if let Some(existing) = self.attributes.iter_mut().find(|(n, _)| *n == name) {
            existing.1 = value;
        } else {
            self.attributes.push((name, value));
        }
    }

    pub fn set_scalar(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.set(name, FeedValue::Scalar(value.into()));
    }

    /// Builder-style scalar attribute.
    pub fn scalar(mut self, name: impl Into<String>, value: impl Into<String>) -> FeedEntryNode {
        self.set_scalar(name, value);
        self
    }

    /// Builder-style child node.
    pub fn child(mut self, name: impl Into<String>, node: FeedEntryNode) -> FeedEntryNode {
        self.set(name, FeedValue::Node(node));
        self
    }

    pub fn get(&self, name: &str) -> Option<&FeedValue> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn get_scalar(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FeedValue::as_scalar)
    }

    /// Iterate attributes in insertion order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &FeedValue)> {
        self.attributes.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.attributes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_existing_name() {
        let mut node = FeedEntryNode::new();
        node.set_scalar("vendor", "A");
        node.set_scalar("vendor", "B");
        assert_eq!(node.get_scalar("vendor"), Some("B"));
        assert_eq!(node.attributes().count(), 1);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let node = FeedEntryNode::new()
            .scalar("name", "Series Name")
            .scalar("position", "3");
        let names: Vec<_> = node.attributes().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["name", "position"]);
    }

    #[test]
    fn test_nested_node() {
        let licensor = FeedEntryNode::new()
            .scalar("vendor", "Overdrive")
            .child("clientToken", FeedEntryNode::with_text("token"));
        match licensor.get("clientToken") {
            Some(FeedValue::Node(inner)) => assert_eq!(inner.text.as_deref(), Some("token")),
            other => panic!("expected nested node, got {:?}", other),
        }
    }
}
