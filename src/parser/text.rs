use scraper::{ElementRef, Node};

/// Elements whose boundaries separate words even when the markup has no
/// whitespace between them.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "td", "th", "table",
    "blockquote",
];

/// Plain text of an element: subscripts become `_x`, superscripts `^x`,
/// whitespace runs collapse to one space.
pub fn inline_text(el: ElementRef<'_>) -> String {
    let mut raw = String::new();
    push_text(el, &mut raw);
    collapse_whitespace(&raw)
}

fn push_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                match child_el.value().name() {
                    "sub" => push_script(child_el, '_', out),
                    "sup" => push_script(child_el, '^', out),
                    "br" => out.push(' '),
                    "script" | "style" => {}
                    name if BLOCK_ELEMENTS.contains(&name) => {
                        out.push(' ');
                        push_text(child_el, out);
                        out.push(' ');
                    }
                    _ => push_text(child_el, out),
                }
            }
            _ => {}
        }
    }
}

/// A script run is glued to the preceding glyph, so its own padding is dropped.
/// Nested runs are rewritten recursively (`x<sup>a<sub>i</sub></sup>` → `x^a_i`).
fn push_script(el: ElementRef<'_>, marker: char, out: &mut String) {
    let mut inner = String::new();
    push_text(el, &mut inner);
    let inner = collapse_whitespace(&inner);
    if !inner.is_empty() {
        out.push(marker);
        out.push_str(&inner);
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Inline `style` attribute with whitespace removed, lowercased.
pub fn style_of(el: ElementRef<'_>) -> String {
    el.value()
        .attr("style")
        .unwrap_or("")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

pub fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}
