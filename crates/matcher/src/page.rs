//! Structural view of the page or screen a fill request came from.
//!
//! The platform bridge flattens its own view hierarchy into [`PageNode`]
//! trees; anything else that can expose children, text, a content
//! description and a domain annotation can implement [`ViewNode`] directly.

use serde::{Deserialize, Serialize};

/// Read-only access to one node of a view tree.
pub trait ViewNode {
    fn domain_annotation(&self) -> Option<&str>;
    fn text(&self) -> Option<&str>;
    fn content_description(&self) -> Option<&str>;
    fn children(&self) -> &[Self]
    where
        Self: Sized;
}

/// Depth-first, pre-order search returning the first hit of `probe`.
pub fn find_first<N, T, F>(root: &N, probe: &mut F) -> Option<T>
where
    N: ViewNode,
    F: FnMut(&N) -> Option<T>,
{
    if let Some(hit) = probe(root) {
        return Some(hit);
    }
    root.children().iter().find_map(|child| find_first(child, probe))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_annotation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PageNode>,
}

impl PageNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain_annotation = Some(domain.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_content_description(mut self, description: impl Into<String>) -> Self {
        self.content_description = Some(description.into());
        self
    }

    pub fn with_child(mut self, child: PageNode) -> Self {
        self.children.push(child);
        self
    }
}

impl ViewNode for PageNode {
    fn domain_annotation(&self) -> Option<&str> {
        self.domain_annotation.as_deref()
    }

    fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    fn content_description(&self) -> Option<&str> {
        self.content_description.as_deref()
    }

    fn children(&self) -> &[Self] {
        &self.children
    }
}

/// All windows of the requesting screen, each with its root node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContext<N = PageNode> {
    #[serde(default)]
    pub windows: Vec<N>,
}

impl<N: ViewNode> PageContext<N> {
    pub fn new(windows: Vec<N>) -> Self {
        Self { windows }
    }

    pub fn single(root: N) -> Self {
        Self {
            windows: vec![root],
        }
    }

    pub fn empty() -> Self {
        Self {
            windows: Vec::new(),
        }
    }

    /// First hit of `probe` across windows in order, each searched depth-first.
    pub fn find_first<T, F>(&self, mut probe: F) -> Option<T>
    where
        F: FnMut(&N) -> Option<T>,
    {
        self.windows
            .iter()
            .find_map(|root| find_first(root, &mut probe))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_is_depth_first_pre_order() {
        let root = PageNode::new()
            .with_child(
                PageNode::new()
                    .with_text("first")
                    .with_child(PageNode::new().with_text("nested")),
            )
            .with_child(PageNode::new().with_text("second"));
        let page = PageContext::single(root);

        let mut visited = Vec::new();
        let none: Option<()> = page.find_first(|node| {
            if let Some(text) = node.text() {
                visited.push(text.to_string());
            }
            None
        });
        assert!(none.is_none());
        assert_eq!(visited, vec!["first", "nested", "second"]);
    }

    #[test]
    fn first_window_hit_wins() {
        let page = PageContext::new(vec![
            PageNode::new().with_child(PageNode::new().with_domain("a.example")),
            PageNode::new().with_domain("b.example"),
        ]);
        let found = page.find_first(|n| n.domain_annotation().map(str::to_owned));
        assert_eq!(found.as_deref(), Some("a.example"));
    }
}
