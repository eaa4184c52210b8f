//! Flat documents: code/division headings followed by one `div[align=left]`
//! per section, each keyed by a visible section-number anchor.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

use super::find_container;
use super::text::{inline_text, style_of};

static SECTION_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?:\.\d+)*$").unwrap());

static MANY_SECTIONS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div#manylawsections").unwrap());
static DISPLAY_SECTIONS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div#display_code_many_law_sections").unwrap());
static LEFT_MARGIN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.displaycodeleftmargin").unwrap());
static HEADINGS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3, h4, h5").unwrap());
static SECTION_DIV: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"div[align="left"]"#).unwrap());
static SECTION_ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h6 a").unwrap());
static PARAGRAPH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());
static ITALIC: LazyLock<Selector> = LazyLock::new(|| Selector::parse("i").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatSection {
    pub number: String,
    pub text: Option<String>,
    pub citation: Option<String>,
}

pub fn normalize(doc: &Html) -> Vec<String> {
    let Some(container) = find_container(doc, &[&MANY_SECTIONS, &DISPLAY_SECTIONS, &LEFT_MARGIN])
    else {
        return Vec::new();
    };

    let mut lines = heading_lines(container);
    for section in parse_sections(container) {
        lines.push(String::new());
        lines.push(format!("{}.", section.number));
        if let Some(text) = section.text {
            lines.push(text);
        }
        if let Some(citation) = section.citation {
            lines.push(String::new());
            lines.push(citation);
        }
    }
    lines
}

/// Each heading, its italic citation (when the next element is `<i>`), then a
/// blank separator.
fn heading_lines(container: ElementRef<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    for heading in container.select(&HEADINGS) {
        let text = inline_text(heading);
        if text.is_empty() {
            continue;
        }
        lines.push(text);

        let next = heading
            .next_siblings()
            .find(|n| !matches!(n.value(), Node::Text(_) | Node::Comment(_)))
            .and_then(ElementRef::wrap);
        if let Some(next) = next.filter(|el| el.value().name() == "i") {
            let citation = inline_text(next);
            if !citation.is_empty() {
                lines.push(format!("  {}", citation));
            }
        }
        lines.push(String::new());
    }
    lines
}

pub fn parse_sections(container: ElementRef<'_>) -> Vec<FlatSection> {
    container
        .select(&SECTION_DIV)
        .filter(|div| div.select(&HEADINGS).next().is_none())
        .filter_map(parse_section)
        .collect()
}

fn parse_section(div: ElementRef<'_>) -> Option<FlatSection> {
    let anchor = div.select(&SECTION_ANCHOR).next()?;
    let number = inline_text(anchor).trim_end_matches('.').to_string();
    if !SECTION_NUMBER_RE.is_match(&number) {
        return None;
    }

    let mut texts = Vec::new();
    let mut citation = None;
    for p in div.select(&PARAGRAPH) {
        let text = inline_text(p);
        if text.is_empty() {
            continue;
        }
        if is_citation(p) {
            citation = Some(text);
        } else {
            texts.push(text);
        }
    }

    let text = if texts.is_empty() {
        None
    } else {
        Some(strip_section_number(&texts.join(" "), &number).to_string())
    };

    Some(FlatSection {
        number,
        text,
        citation,
    })
}

fn is_citation(p: ElementRef<'_>) -> bool {
    style_of(p).contains("font-size:0.9em") || p.select(&ITALIC).next().is_some()
}

/// Drop the section number the body repeats at its start ("1011.5. The ...").
/// Only a verbatim repeat is recognized.
pub fn strip_section_number<'a>(text: &'a str, number: &str) -> &'a str {
    match text.strip_prefix(number) {
        Some(rest) => rest.strip_prefix('.').unwrap_or(rest).trim_start(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> Html {
        Html::parse_document(&format!(
            r#"<html><body><div id="manylawsections">{}</div></body></html>"#,
            body
        ))
    }

    #[test]
    fn section_number_text_and_citation() {
        let doc = page(
            r#"<div align="left"><h6><a href="/x">1011.5.</a></h6>
                 <p style="margin:0;display:inline;">1011.5. The department shall conserve water.</p>
                 <p style="font-size:0.9em;"><i>(Added by Stats. 1991, Ch. 1.)</i></p>
               </div>"#,
        );
        assert_eq!(
            normalize(&doc),
            vec![
                "",
                "1011.5.",
                "The department shall conserve water.",
                "",
                "(Added by Stats. 1991, Ch. 1.)",
            ]
        );
    }

    #[test]
    fn headings_with_italic_citation() {
        let doc = page(
            r#"<h3>WATER CODE - WAT</h3>
               <h4>DIVISION 6. CONSERVATION</h4> <i>( Division 6 enacted by Stats. 1943 )</i>
               <h5>PART 1. GENERAL</h5><p>not a citation</p>"#,
        );
        assert_eq!(
            normalize(&doc),
            vec![
                "WATER CODE - WAT",
                "",
                "DIVISION 6. CONSERVATION",
                "  ( Division 6 enacted by Stats. 1943 )",
                "",
                "PART 1. GENERAL",
                "",
            ]
        );
    }

    #[test]
    fn stray_anchor_is_not_a_section() {
        let doc = page(
            r#"<div align="left"><h6><a href="/x">Top of page</a></h6><p>text</p></div>
               <div align="left"><h6><a href="/x">12.</a></h6><p>12. Body.</p></div>"#,
        );
        let container = doc.select(&MANY_SECTIONS).next().unwrap();
        let sections = parse_sections(container);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].number, "12");
        assert_eq!(sections[0].text.as_deref(), Some("Body."));
        assert!(sections[0].citation.is_none());
    }

    #[test]
    fn fallback_container() {
        let doc = Html::parse_document(
            r#"<div class="displaycodeleftmargin"><div align="left"><h6><a>7.</a></h6><p>Seven.</p></div></div>"#,
        );
        assert_eq!(normalize(&doc), vec!["", "7.", "Seven."]);
    }

    #[test]
    fn number_strip_needs_verbatim_repeat() {
        assert_eq!(strip_section_number("101. Text", "101"), "Text");
        assert_eq!(strip_section_number("101 Text", "101"), "Text");
        assert_eq!(strip_section_number("(101) Text", "101"), "(101) Text");
    }

    #[test]
    fn no_container_is_empty() {
        assert!(normalize(&Html::parse_document("<p>nothing</p>")).is_empty());
    }
}
