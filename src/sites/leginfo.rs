use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{is_reserved, query_param, resolve, SiteSchema};
use crate::config::{CrawlTarget, TargetError};
use crate::node::{Node, NodeKind, NodePath};
use crate::parser::flat;
use crate::parser::text::{inline_text, style_of};

pub const BASE_URL: &str = "https://leginfo.legislature.ca.gov";

static LISTING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div#expandedbranchcodesid").unwrap());
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static DIV: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div").unwrap());

const LISTING_PAGE: &str = "codes_displayexpandedbranch";
const CONTENT_PAGE: &str = "codes_displayText";

/// How one level of children appears on its parent's listing page.
struct Level {
    kind: NodeKind,
    indent: &'static str,
    keyword: &'static str,
    param: &'static str,
}

fn child_level(parent: NodeKind) -> Option<Level> {
    let (kind, indent, keyword, param) = match parent {
        NodeKind::Division => (NodeKind::Part, "margin-left:20px", "PART", "part"),
        NodeKind::Part => (NodeKind::Chapter, "margin-left:30px", "CHAPTER", "chapter"),
        NodeKind::Chapter => (NodeKind::Article, "margin-left:40px", "ARTICLE", "article"),
        NodeKind::Article | NodeKind::Section => return None,
    };
    Some(Level {
        kind,
        indent,
        keyword,
        param,
    })
}

pub fn division_url(code: &str, division: &str) -> String {
    format!(
        "{}/faces/{}.xhtml?tocCode={}&division={}.&title=&part=&chapter=&article=",
        BASE_URL,
        LISTING_PAGE,
        code,
        division.trim_end_matches('.')
    )
}

pub struct Leginfo;

impl SiteSchema for Leginfo {
    fn name(&self) -> &'static str {
        "leginfo"
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn root(&self, target: &CrawlTarget) -> Result<Node, TargetError> {
        if target.division.trim().is_empty() {
            return Err(target.error("a division is required"));
        }
        let locator = target
            .root_url
            .clone()
            .unwrap_or_else(|| division_url(&target.code, &target.division));
        let title = target
            .title
            .clone()
            .unwrap_or_else(|| format!("{} Division {}", target.code_name, target.division));
        let path = NodePath::new(&target.code, &target.division);
        Ok(Node::new(NodeKind::Division, path, &title, &locator, true))
    }

    fn child_entries(&self, doc: &Html, parent: &Node) -> Vec<Node> {
        let Some(listing) = doc.select(&LISTING).next() else {
            debug!(url = %parent.locator, "no expanded branch listing on page");
            return Vec::new();
        };
        let Some(level) = child_level(parent.kind) else {
            return Vec::new();
        };

        listing
            .select(&ANCHOR)
            .filter_map(|anchor| child_from_anchor(anchor, parent, &level))
            .collect()
    }

    fn normalize(&self, doc: &Html) -> Vec<String> {
        flat::normalize(doc)
    }
}

fn child_from_anchor(anchor: ElementRef<'_>, parent: &Node, level: &Level) -> Option<Node> {
    let href = anchor.value().attr("href")?;
    let label_div = anchor
        .select(&DIV)
        .find(|div| style_of(*div).contains(level.indent))?;

    let title = inline_text(label_div);
    if !title.to_uppercase().contains(level.keyword) || is_reserved(&title) {
        return None;
    }

    // Articles are the deepest listed level, so only their content pages count.
    let expandable = if href.contains(LISTING_PAGE) {
        if child_level(level.kind).is_none() {
            return None;
        }
        true
    } else if href.contains(CONTENT_PAGE) {
        false
    } else {
        return None;
    };

    let locator = resolve(BASE_URL, href)?;
    let label = query_param(&locator, level.param).filter(|l| !l.trim().is_empty())?;

    let range = anchor
        .select(&DIV)
        .find(|div| style_of(*div).contains("float:right"))
        .map(inline_text)
        .unwrap_or_default();

    let path = parent.path.clone().with(level.kind, &label);
    Some(Node::new(level.kind, path, &title, &locator, expandable).with_range(&range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn division() -> Node {
        let target = Settings::default().targets.remove(0);
        Leginfo.root(&target).unwrap()
    }

    fn entry(href: &str, indent: u32, text: &str, range: &str) -> String {
        format!(
            r#"<a href="{href}"><div style="margin-left:{indent}px;">{text}</div><div style="float:right">{range}</div></a>"#
        )
    }

    fn listing(entries: &[String]) -> Html {
        Html::parse_document(&format!(
            r#"<html><body><div id="expandedbranchcodesid">{}</div></body></html>"#,
            entries.concat()
        ))
    }

    #[test]
    fn root_locator_for_division() {
        let root = division();
        assert_eq!(
            root.locator,
            "https://leginfo.legislature.ca.gov/faces/codes_displayexpandedbranch.xhtml?tocCode=WAT&division=6.&title=&part=&chapter=&article="
        );
        assert!(root.expandable);
        assert_eq!(root.kind, NodeKind::Division);
    }

    #[test]
    fn parts_classified_by_href() {
        let doc = listing(&[
            entry(
                "/faces/codes_displayexpandedbranch.xhtml?tocCode=WAT&division=6.&title=&part=1.&chapter=&article=",
                20,
                "PART 1. GENERAL PROVISIONS",
                "6000-6008",
            ),
            entry(
                "/faces/codes_displayText.xhtml?lawCode=WAT&division=6.&title=&part=2.&chapter=&article=",
                20,
                "PART 2. SUPERVISION",
                "",
            ),
            entry(
                "/faces/codes_displayexpandedbranch.xhtml?tocCode=WAT&division=6.&title=&part=3.&chapter=&article=",
                20,
                "PART 3. (Reserved)",
                "",
            ),
        ]);
        let parts = Leginfo.child_entries(&doc, &division());
        assert_eq!(parts.len(), 2);

        assert_eq!(parts[0].title, "PART 1. GENERAL PROVISIONS");
        assert!(parts[0].expandable);
        assert_eq!(parts[0].range.as_deref(), Some("6000-6008"));
        assert_eq!(parts[0].path.part.as_deref(), Some("1"));
        assert_eq!(parts[0].path.division, "6");

        assert!(!parts[1].expandable);
        assert!(parts[1].range.is_none());
    }

    #[test]
    fn wrong_indent_or_keyword_ignored() {
        let doc = listing(&[
            entry(
                "/faces/codes_displayexpandedbranch.xhtml?tocCode=WAT&division=6.&part=1.&chapter=1.",
                30,
                "CHAPTER 1. Shown at chapter depth",
                "",
            ),
            entry(
                "/faces/codes_displayexpandedbranch.xhtml?tocCode=WAT&division=6.&part=4.",
                20,
                "TITLE without the keyword",
                "",
            ),
            entry("/faces/codes_displayexpandedbranch.xhtml?tocCode=WAT&division=6.&part=", 20, "PART 9.", ""),
        ]);
        assert!(Leginfo.child_entries(&doc, &division()).is_empty());
    }

    #[test]
    fn chapters_then_articles() {
        let part = Node::new(
            NodeKind::Part,
            NodePath::new("WAT", "6").with(NodeKind::Part, "2"),
            "PART 2.",
            "https://leginfo.legislature.ca.gov/p2",
            true,
        );
        let doc = listing(&[entry(
            "/faces/codes_displayexpandedbranch.xhtml?tocCode=WAT&division=6.&part=2.&chapter=3.5.&article=",
            30,
            "CHAPTER 3.5. Dams",
            "6100-6200",
        )]);
        let chapters = Leginfo.child_entries(&doc, &part);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].kind, NodeKind::Chapter);
        assert_eq!(chapters[0].path.chapter.as_deref(), Some("3.5"));

        let doc = listing(&[entry(
            "/faces/codes_displayText.xhtml?lawCode=WAT&division=6.&part=2.&chapter=3.5.&article=1.",
            40,
            "ARTICLE 1. Definitions",
            "6100-6105",
        )]);
        let articles = Leginfo.child_entries(&doc, &chapters[0]);
        assert_eq!(articles.len(), 1);
        assert!(articles[0].is_leaf());
        assert_eq!(articles[0].path.article.as_deref(), Some("1"));
        assert_eq!(articles[0].path.part.as_deref(), Some("2"));
    }

    #[test]
    fn articles_must_link_to_content() {
        let chapter = Node::new(
            NodeKind::Chapter,
            NodePath::new("WAT", "6").with(NodeKind::Part, "2").with(NodeKind::Chapter, "1"),
            "CHAPTER 1.",
            "https://leginfo.legislature.ca.gov/c1",
            true,
        );
        let doc = listing(&[
            entry(
                "/faces/codes_displayexpandedbranch.xhtml?tocCode=WAT&division=6.&part=2.&chapter=1.&article=1.",
                40,
                "ARTICLE 1. Branch link",
                "",
            ),
            entry(
                "/faces/codes_displayText.xhtml?lawCode=WAT&division=6.&part=2.&chapter=1.&article=2.",
                40,
                "ARTICLE 2. Text link",
                "",
            ),
        ]);
        let articles = Leginfo.child_entries(&doc, &chapter);
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "ARTICLE 2. Text link");
        assert!(articles[0].is_leaf());
    }

    #[test]
    fn missing_listing_is_empty() {
        let doc = Html::parse_document("<html><body>Service unavailable</body></html>");
        assert!(Leginfo.child_entries(&doc, &division()).is_empty());
    }
}
