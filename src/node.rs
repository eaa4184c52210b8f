use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Division,
    Part,
    Chapter,
    Article,
    Section,
}

impl NodeKind {
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Division => "Division",
            NodeKind::Part => "Part",
            NodeKind::Chapter => "Chapter",
            NodeKind::Article => "Article",
            NodeKind::Section => "Section",
        }
    }

    /// Short prefix used in generated file names.
    pub fn file_prefix(self) -> &'static str {
        match self {
            NodeKind::Division => "div",
            NodeKind::Part => "part",
            NodeKind::Chapter => "ch",
            NodeKind::Article => "art",
            NodeKind::Section => "sec",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Position of a node in the code: code and division always, the rest as deep
/// as the node sits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodePath {
    pub code: String,
    pub division: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl NodePath {
    pub fn new(code: &str, division: &str) -> Self {
        NodePath {
            code: code.to_string(),
            division: normalize_label(division),
            part: None,
            chapter: None,
            article: None,
            section: None,
        }
    }

    pub fn with(mut self, kind: NodeKind, label: &str) -> Self {
        let label = normalize_label(label);
        match kind {
            NodeKind::Division => self.division = label,
            NodeKind::Part => self.part = Some(label),
            NodeKind::Chapter => self.chapter = Some(label),
            NodeKind::Article => self.article = Some(label),
            NodeKind::Section => self.section = Some(label),
        }
        self
    }

    pub fn label(&self, kind: NodeKind) -> Option<&str> {
        match kind {
            NodeKind::Division => Some(self.division.as_str()),
            NodeKind::Part => self.part.as_deref(),
            NodeKind::Chapter => self.chapter.as_deref(),
            NodeKind::Article => self.article.as_deref(),
            NodeKind::Section => self.section.as_deref(),
        }
    }

    /// Present components below the code, outermost first.
    pub fn components(&self) -> Vec<(NodeKind, &str)> {
        [
            NodeKind::Division,
            NodeKind::Part,
            NodeKind::Chapter,
            NodeKind::Article,
            NodeKind::Section,
        ]
        .into_iter()
        .filter_map(|kind| self.label(kind).map(|label| (kind, label)))
        .collect()
    }

    /// "Division 6, Part 2.5, Chapter 1"
    pub fn describe(&self) -> String {
        self.components()
            .iter()
            .map(|(kind, label)| format!("{} {}", kind, label))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Query-string labels carry a trailing period ("6.", "2.5.").
pub fn normalize_label(label: &str) -> String {
    label.trim().trim_end_matches('.').to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub kind: NodeKind,
    pub path: NodePath,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    pub locator: String,
    pub expandable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: NodeKind, path: NodePath, title: &str, locator: &str, expandable: bool) -> Self {
        Node {
            kind,
            path,
            title: title.to_string(),
            range: None,
            locator: locator.to_string(),
            expandable,
            children: Vec::new(),
        }
    }

    pub fn with_range(mut self, range: &str) -> Self {
        let range = range.trim();
        if !range.is_empty() {
            self.range = Some(range.to_string());
        }
        self
    }

    pub fn is_leaf(&self) -> bool {
        !self.expandable
    }

    pub fn label(&self) -> Option<&str> {
        self.path.label(self.kind)
    }

    /// Number of leaves in this subtree, including the node itself.
    pub fn leaf_count(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.children.iter().map(Node::leaf_count).sum()
        }
    }
}

/// Restricts discovery to the listed labels at one level of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFilter {
    pub kind: NodeKind,
    pub labels: Vec<String>,
}

impl NodeFilter {
    pub fn new(kind: NodeKind, labels: &[String]) -> Self {
        NodeFilter {
            kind,
            labels: labels.iter().map(|l| normalize_label(l)).collect(),
        }
    }

    pub fn admits(&self, node: &Node) -> bool {
        if node.kind != self.kind {
            return true;
        }
        match node.label() {
            Some(label) => self.labels.iter().any(|l| l == label),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(label: &str) -> Node {
        let path = NodePath::new("HSC", "104.").with(NodeKind::Part, label);
        Node::new(NodeKind::Part, path, "PART", "https://example.test", true)
    }

    #[test]
    fn labels_drop_trailing_period() {
        let path = NodePath::new("WAT", "6.").with(NodeKind::Part, "2.5.");
        assert_eq!(path.division, "6");
        assert_eq!(path.part.as_deref(), Some("2.5"));
    }

    #[test]
    fn describe_lists_present_components() {
        let path = NodePath::new("WAT", "6")
            .with(NodeKind::Part, "1")
            .with(NodeKind::Chapter, "3.5");
        assert_eq!(path.describe(), "Division 6, Part 1, Chapter 3.5");
    }

    #[test]
    fn filter_only_applies_to_its_level() {
        let filter = NodeFilter::new(NodeKind::Part, &["12".to_string()]);
        assert!(filter.admits(&part("12.")));
        assert!(!filter.admits(&part("11.")));

        let chapter_path = NodePath::new("HSC", "104").with(NodeKind::Chapter, "1");
        let chapter = Node::new(NodeKind::Chapter, chapter_path, "CHAPTER 1", "u", false);
        assert!(filter.admits(&chapter));
    }

    #[test]
    fn leaf_count_ignores_listings() {
        let mut root = part("1");
        root.children.push(part("2"));
        let mut leaf = part("3");
        leaf.expandable = false;
        root.children[0].children.push(leaf.clone());
        root.children.push(leaf);
        assert_eq!(root.leaf_count(), 2);
    }

    #[test]
    fn empty_range_is_dropped() {
        assert!(part("1").with_range("  ").range.is_none());
        assert_eq!(part("1").with_range("116270-117130").range.as_deref(), Some("116270-117130"));
    }
}
