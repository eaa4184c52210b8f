//! Block-structured documents: a header with title and citation lines, then a
//! run of classed content blocks (section, subsection, paragraph, other).

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::text::{has_class, inline_text};
use super::{find_container, outermost};

static SUBSECTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\([a-z]\)").unwrap());

static DOCUMENT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div#co_document").unwrap());
static HEADER_TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div#co_docHeaderTitle h1").unwrap());
static HEADER_CITATION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div#co_docHeaderTitle ul#co_docHeaderCitation li").unwrap());
static CONTENT_BLOCK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.co_contentBlock").unwrap());
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.co_paragraph").unwrap());

/// Trailers that carry citations and administrative history, not law text.
const BOILERPLATE_PREFIXES: &[&str] = &["Note:", "History:", "Credits"];

/// Metadata blocks repeated from the page header.
const SKIPPED_CLASSES: &[&str] = &["co_documentHead", "co_printHeading"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Heading,
    Citation,
    Section,
    Subsection,
    Paragraph,
    Generic,
}

#[derive(Debug, Clone)]
pub struct ContentBlock<'a> {
    pub kind: BlockKind,
    pub element: ElementRef<'a>,
}

pub fn normalize(doc: &Html) -> Vec<String> {
    let Some(container) = find_container(doc, &[&DOCUMENT]) else {
        return Vec::new();
    };
    render(&collect_blocks(doc, container))
}

/// Header blocks first, then the container's top-level content blocks in
/// document order.
pub fn collect_blocks<'a>(doc: &'a Html, container: ElementRef<'a>) -> Vec<ContentBlock<'a>> {
    let mut blocks = Vec::new();

    let header = doc
        .select(&HEADER_TITLE)
        .take(1)
        .map(|el| (BlockKind::Heading, el))
        .chain(doc.select(&HEADER_CITATION).map(|el| (BlockKind::Citation, el)));
    for (kind, element) in header {
        blocks.push(ContentBlock {
            kind,
            element,
        });
    }

    for element in outermost(container, &CONTENT_BLOCK) {
        if SKIPPED_CLASSES.iter().any(|c| has_class(element, c)) {
            continue;
        }
        blocks.push(ContentBlock {
            kind: classify(element),
            element,
        });
    }

    blocks
}

pub fn classify(element: ElementRef<'_>) -> BlockKind {
    if has_class(element, "co_section") {
        BlockKind::Section
    } else if has_class(element, "co_subsection") {
        BlockKind::Subsection
    } else if has_class(element, "co_paragraph") {
        BlockKind::Paragraph
    } else {
        BlockKind::Generic
    }
}

pub fn render(blocks: &[ContentBlock<'_>]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut header_open = false;

    for block in blocks {
        let text = inline_text(block.element);
        match block.kind {
            BlockKind::Heading => {
                if text.is_empty() {
                    continue;
                }
                let underline = "=".repeat(text.chars().count());
                lines.push(text);
                lines.push(underline);
                header_open = true;
            }
            BlockKind::Citation => {
                if !text.is_empty() {
                    lines.push(text);
                    header_open = true;
                }
            }
            kind => {
                if header_open {
                    lines.push(String::new());
                    header_open = false;
                }
                render_body(kind, block.element, text, &mut lines);
            }
        }
    }

    if header_open {
        lines.push(String::new());
    }
    lines
}

fn render_body(kind: BlockKind, element: ElementRef<'_>, text: String, lines: &mut Vec<String>) {
    match kind {
        BlockKind::Section => {
            let paragraphs: Vec<String> = outermost(element, &PARAGRAPH)
                .into_iter()
                .map(inline_text)
                .filter(|t| !t.is_empty())
                .collect();
            if paragraphs.is_empty() && !text.is_empty() {
                lines.push(text);
            }
            for para in paragraphs {
                if SUBSECTION_RE.is_match(&para) {
                    lines.push(String::new());
                }
                lines.push(para);
            }
            lines.push(String::new());
        }
        BlockKind::Subsection => {
            if !text.is_empty() {
                lines.push(text);
                lines.push(String::new());
            }
        }
        BlockKind::Paragraph => {
            if !text.is_empty() {
                lines.push(text);
            }
        }
        _ => {
            if !text.is_empty() && !is_boilerplate(&text) {
                lines.push(text);
                lines.push(String::new());
            }
        }
    }
}

pub fn is_boilerplate(text: &str) -> bool {
    BOILERPLATE_PREFIXES.iter().any(|p| text.starts_with(p))
}
