pub mod leginfo;
pub mod westlaw;

use scraper::Html;
use url::Url;

use crate::config::{CrawlTarget, SiteKind, TargetError};
use crate::node::Node;

/// Everything that depends on one site's markup: where the tree starts, how
/// a listing page names its children, and how a content page reads as text.
pub trait SiteSchema {
    fn name(&self) -> &'static str;

    /// Base for resolving relative links.
    fn base_url(&self) -> &'static str;

    /// Host that serves root-relative image paths.
    fn image_host(&self) -> &'static str {
        self.base_url()
    }

    fn root(&self, target: &CrawlTarget) -> Result<Node, TargetError>;

    /// Child descriptors on `parent`'s listing page, in document order.
    /// A page without a recognizable listing yields no children.
    fn child_entries(&self, doc: &Html, parent: &Node) -> Vec<Node>;

    /// Body lines of a content page; empty when the content container is absent.
    fn normalize(&self, doc: &Html) -> Vec<String>;
}

pub fn for_site(kind: SiteKind) -> Box<dyn SiteSchema> {
    match kind {
        SiteKind::Leginfo => Box::new(leginfo::Leginfo),
        SiteKind::Westlaw => Box::new(westlaw::Westlaw),
    }
}

/// Entries that exist in the table of contents but have no text.
pub fn is_reserved(text: &str) -> bool {
    text.contains("(Reserved)") || text.contains("[Reserved]")
}

pub fn resolve(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(href.trim()).ok().map(|u| u.to_string())
}

pub fn query_param(locator: &str, name: &str) -> Option<String> {
    let url = Url::parse(locator).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
