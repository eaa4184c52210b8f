pub mod blocks;
pub mod flat;
pub mod text;

use scraper::{ElementRef, Html, Selector};

/// First element matching any of `selectors`, tried in order.
pub fn find_container<'a>(doc: &'a Html, selectors: &[&Selector]) -> Option<ElementRef<'a>> {
    selectors
        .iter()
        .find_map(|sel| doc.select(sel).next())
}

/// Matches of `sel` under `root` that are not nested inside another match.
pub fn outermost<'a>(root: ElementRef<'a>, sel: &Selector) -> Vec<ElementRef<'a>> {
    let matches: Vec<ElementRef<'a>> = root.select(sel).collect();
    let ids: Vec<_> = matches.iter().map(|el| el.id()).collect();
    matches
        .into_iter()
        .filter(|el| {
            !el.ancestors()
                .take_while(|a| a.id() != root.id())
                .any(|a| ids.contains(&a.id()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_priority_order() {
        let doc = Html::parse_document(r#"<div class="b">second</div><div id="a">first</div>"#);
        let a = Selector::parse("#a").unwrap();
        let b = Selector::parse(".b").unwrap();
        let found = find_container(&doc, &[&a, &b]).unwrap();
        assert_eq!(found.value().attr("id"), Some("a"));

        let missing = Selector::parse("#none").unwrap();
        assert!(find_container(&doc, &[&missing]).is_none());
    }

    #[test]
    fn outermost_skips_nested() {
        let doc = Html::parse_document(
            r#"<div id="root"><div class="x" id="one"><div class="x" id="inner"></div></div><div class="x" id="two"></div></div>"#,
        );
        let root = doc.select(&Selector::parse("#root").unwrap()).next().unwrap();
        let found = outermost(root, &Selector::parse(".x").unwrap());
        let ids: Vec<_> = found.iter().filter_map(|e| e.value().attr("id")).collect();
        assert_eq!(ids, vec!["one", "two"]);
    }
}
