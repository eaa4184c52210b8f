use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::debug;

use super::{is_reserved, resolve, SiteSchema};
use crate::config::{CrawlTarget, TargetError};
use crate::node::{Node, NodeKind, NodePath};
use crate::parser::blocks;
use crate::parser::text::inline_text;

pub const BASE_URL: &str = "https://shared-govt.westlaw.com";
pub const IMAGE_HOST: &str = "https://govt.westlaw.com";

static LIST: LazyLock<Selector> = LazyLock::new(|| Selector::parse("ul.co_genericWhiteBox").unwrap());
static ITEM: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li").unwrap());
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

fn child_kind(parent: NodeKind) -> Option<NodeKind> {
    match parent {
        NodeKind::Division | NodeKind::Part => Some(NodeKind::Chapter),
        NodeKind::Chapter => Some(NodeKind::Article),
        NodeKind::Article => Some(NodeKind::Section),
        NodeKind::Section => None,
    }
}

/// Documents are content, browse pages are listings. Links that say neither
/// fall back to depth: sections are the leaves.
fn is_listing(href: &str, kind: NodeKind) -> bool {
    if href.contains("/Document/") {
        false
    } else if href.contains("/Browse/") {
        true
    } else {
        kind != NodeKind::Section
    }
}

pub struct Westlaw;

impl SiteSchema for Westlaw {
    fn name(&self) -> &'static str {
        "westlaw"
    }

    fn base_url(&self) -> &'static str {
        BASE_URL
    }

    fn image_host(&self) -> &'static str {
        IMAGE_HOST
    }

    fn root(&self, target: &CrawlTarget) -> Result<Node, TargetError> {
        let locator = target
            .root_url
            .as_deref()
            .ok_or_else(|| target.error("root_url is required for westlaw targets"))?;

        let mut path = NodePath::new(&target.code, &target.division);
        let kind = match &target.chapter {
            Some(chapter) => {
                path = path.with(NodeKind::Chapter, chapter);
                NodeKind::Chapter
            }
            None => NodeKind::Division,
        };
        let title = target.title.clone().unwrap_or_else(|| target.code_name.clone());
        Ok(Node::new(kind, path, &title, locator, true))
    }

    fn child_entries(&self, doc: &Html, parent: &Node) -> Vec<Node> {
        let Some(list) = doc.select(&LIST).next() else {
            debug!(url = %parent.locator, "no browse list on page");
            return Vec::new();
        };
        let Some(kind) = child_kind(parent.kind) else {
            return Vec::new();
        };

        let mut children = Vec::new();
        for item in list.select(&ITEM) {
            let Some(link) = item.select(&LINK).next() else {
                continue;
            };
            let title = inline_text(link);
            if title.is_empty() || is_reserved(&title) {
                continue;
            }
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let Some(locator) = resolve(BASE_URL, href) else {
                continue;
            };

            // Browse lists carry no numbering in their links, so position is the label.
            let label = (children.len() + 1).to_string();
            let path = parent.path.clone().with(kind, &label);
            children.push(Node::new(kind, path, &title, &locator, is_listing(href, kind)));
        }
        children
    }

    fn normalize(&self, doc: &Html) -> Vec<String> {
        blocks::normalize(doc)
    }
}
