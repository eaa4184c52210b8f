use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::config::CrawlTarget;
use crate::error::ScrapeError;
use crate::formula::ExtractedImage;
use crate::node::{Node, NodeKind};

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '§'];

const TITLE_LIMIT: usize = 50;
const STEM_LIMIT: usize = 150;
const RULE_WIDTH: usize = 80;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const STRUCTURE_FILE: &str = "structure.json";
pub const IMAGES_FILE: &str = "images_metadata.json";
pub const IMAGES_DIR: &str = "images";

/// Filesystem-safe form of arbitrary text: whitespace runs become `_`, as do
/// reserved characters and control characters.
pub fn sanitize(text: &str) -> String {
    WHITESPACE_RE
        .replace_all(text.trim(), "_")
        .chars()
        .map(|c| {
            if ILLEGAL_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// `WAT_div6_part2_ch3_5_<title>_0007.txt`; `ordinal` is the leaf's position
/// in discovery order.
pub fn leaf_filename(node: &Node, ordinal: usize) -> String {
    let mut stem = sanitize(&node.path.code);
    for (kind, label) in node.path.components() {
        stem.push('_');
        stem.push_str(kind.file_prefix());
        stem.push_str(&sanitize(label).replace('.', "_"));
    }
    let title = truncate_chars(&sanitize(&node.title), TITLE_LIMIT);
    if !title.is_empty() {
        stem.push('_');
        stem.push_str(&title);
    }
    format!("{}_{:04}.txt", truncate_chars(&stem, STEM_LIMIT), ordinal)
}

/// Metadata header followed by the normalized body. `ancestors` runs from
/// just below the root down to the leaf's parent.
pub fn render_leaf(target: &CrawlTarget, ancestors: &[&Node], leaf: &Node, body: &[String]) -> String {
    let mut out = Vec::new();
    out.push(format!("{} - {}", target.code_name.to_uppercase(), target.code));
    out.extend(target.header_lines.iter().cloned());
    out.push(leaf.path.describe());

    let context: Vec<&str> = ancestors.iter().map(|n| n.title.as_str()).collect();
    if !context.is_empty() {
        out.push(format!("Context: {}", context.join(" > ")));
    }

    out.push(format!("Title: {}", leaf.title));
    out.push(format!("URL: {}", leaf.locator));
    out.push("=".repeat(RULE_WIDTH));
    out.push(String::new());
    out.push(body.join("\n"));
    out.join("\n")
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestNode {
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub title: String,
    pub locator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    pub expandable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ManifestNode>,
}

impl ManifestNode {
    /// Descriptor without children, filename or images.
    pub fn describe(node: &Node) -> Self {
        ManifestNode {
            kind: node.kind,
            label: node.label().map(str::to_string),
            title: node.title.clone(),
            locator: node.locator.clone(),
            range: node.range.clone(),
            expandable: node.expandable,
            filename: None,
            images: Vec::new(),
            children: Vec::new(),
        }
    }

    /// The discovered tree as-is, for structure dumps.
    pub fn structure(node: &Node) -> Self {
        let mut desc = Self::describe(node);
        desc.children = node.children.iter().map(Self::structure).collect();
        desc
    }
}

/// Everything one run discovered and wrote for a target.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeManifest {
    pub name: String,
    pub title: String,
    pub root_locator: String,
    pub generated_at: String,
    pub nodes: Vec<ManifestNode>,
    pub total_leaves: usize,
    pub leaves_written: usize,
    pub total_images: usize,
    #[serde(skip)]
    pub images: Vec<ExtractedImage>,
}

impl ScrapeManifest {
    pub fn new(target: &CrawlTarget, root: &Node) -> Self {
        ScrapeManifest {
            name: target.name.clone(),
            title: target.code_name.clone(),
            root_locator: root.locator.clone(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            nodes: Vec::new(),
            total_leaves: 0,
            leaves_written: 0,
            total_images: 0,
            images: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageRecord {
    pub original_locator: String,
    pub local_filename: String,
    pub descriptive_text: String,
    pub owning_leaf_description: String,
}

impl From<&ExtractedImage> for ImageRecord {
    fn from(image: &ExtractedImage) -> Self {
        ImageRecord {
            original_locator: image.source_locator.clone(),
            local_filename: image.local_filename.clone(),
            descriptive_text: image.descriptive_text.clone(),
            owning_leaf_description: format!(
                "Mathematical formula from {} ({})",
                image.owner_title,
                image.owner_path.describe()
            ),
        }
    }
}

pub fn write_text(path: &Path, contents: &str) -> Result<(), ScrapeError> {
    fs::write(path, contents).map_err(|source| ScrapeError::Persist {
        path: path.to_path_buf(),
        source,
    })
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ScrapeError> {
    let json = serde_json::to_string_pretty(value).map_err(|err| ScrapeError::Persist {
        path: path.to_path_buf(),
        source: err.into(),
    })?;
    write_text(path, &json)
}

pub fn ensure_dir(path: &Path) -> Result<(), ScrapeError> {
    fs::create_dir_all(path).map_err(|source| ScrapeError::Persist {
        path: path.to_path_buf(),
        source,
    })
}

/// `manifest.json`, plus `images_metadata.json` when any images were saved.
pub fn write_manifest(dir: &Path, manifest: &ScrapeManifest) -> Result<(), ScrapeError> {
    write_json(&dir.join(MANIFEST_FILE), manifest)?;
    if !manifest.images.is_empty() {
        let records: Vec<ImageRecord> = manifest.images.iter().map(ImageRecord::from).collect();
        write_json(&dir.join(IMAGES_FILE), &records)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::node::NodePath;

    fn leaf(title: &str) -> Node {
        let path = NodePath::new("WAT", "6.")
            .with(NodeKind::Part, "2.")
            .with(NodeKind::Chapter, "3.5.")
            .with(NodeKind::Article, "1.");
        Node::new(NodeKind::Article, path, title, "https://example.test/a1", false)
    }

    #[test]
    fn sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize("a/b\\c:d*e?f\"g<h>i|j"), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize("§ 975.  Definitions"), "__975._Definitions");
        assert_eq!(sanitize("tab\there"), "tab_here");
    }

    #[test]
    fn sanitize_is_deterministic() {
        let title = "ARTICLE 1. Water/Power § 2 <draft>";
        assert_eq!(sanitize(title), sanitize(title));
        assert!(!sanitize(title).contains(['/', '§', '<', '>', ' ']));
    }

    #[test]
    fn leaf_filename_from_path() {
        assert_eq!(
            leaf_filename(&leaf("ARTICLE 1. Definitions"), 7),
            "WAT_div6_part2_ch3_5_art1_ARTICLE_1._Definitions_0007.txt"
        );
    }

    #[test]
    fn leaf_filename_is_bounded() {
        let long = "x".repeat(500);
        let name = leaf_filename(&leaf(&long), 1);
        assert!(name.chars().count() <= STEM_LIMIT + "_0001.txt".len());
        assert!(name.contains(&"x".repeat(TITLE_LIMIT)));
        assert!(!name.contains(&"x".repeat(TITLE_LIMIT + 1)));
    }

    #[test]
    fn leaf_header_block() {
        let settings = Settings::default();
        let target = &settings.targets[0];
        let part = Node::new(
            NodeKind::Part,
            NodePath::new("WAT", "6").with(NodeKind::Part, "2"),
            "PART 2. DAMS",
            "u",
            true,
        );
        let leaf = leaf("ARTICLE 1. Definitions");
        let text = render_leaf(target, &[&part], &leaf, &["body line".to_string()]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "WATER CODE - WAT");
        assert_eq!(lines[1], "Division 6, Part 2, Chapter 3.5, Article 1");
        assert_eq!(lines[2], "Context: PART 2. DAMS");
        assert_eq!(lines[3], "Title: ARTICLE 1. Definitions");
        assert_eq!(lines[4], "URL: https://example.test/a1");
        assert_eq!(lines[5], "=".repeat(80));
        assert_eq!(lines[6], "");
        assert_eq!(lines[7], "body line");
    }

    #[test]
    fn structure_keeps_order_and_nesting() {
        let mut root = Node::new(NodeKind::Division, NodePath::new("WAT", "6"), "D", "u", true);
        root.children.push(leaf("first"));
        root.children.push(leaf("second"));
        let desc = ManifestNode::structure(&root);
        let titles: Vec<_> = desc.children.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "second"]);
        assert_eq!(desc.children[0].label.as_deref(), Some("1"));

        let json = serde_json::to_value(&desc).unwrap();
        assert_eq!(json["kind"], "division");
        assert!(json["children"][0].get("children").is_none());
    }
}
