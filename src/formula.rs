use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::fetch::Fetch;
use crate::node::{Node, NodePath};
use crate::output::sanitize;

static IMAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img[src]").unwrap());

/// Alt-text vocabulary that marks an image as a formula.
const FORMULA_WORDS: &[&str] = &["formula", "equation", "sum", "equals", "water loss"];

const DEFAULT_DESCRIPTION: &str = "Mathematical formula";
const DEFAULT_BASENAME: &str = "formula.png";

#[derive(Debug, Clone, Serialize)]
pub struct ExtractedImage {
    pub source_locator: String,
    pub local_filename: String,
    pub descriptive_text: String,
    pub owner_title: String,
    pub owner_path: NodePath,
}

pub fn qualifies(alt: &str, parent_classes: &[&str]) -> bool {
    let alt = alt.to_lowercase();
    parent_classes.iter().any(|c| c.contains("figure"))
        || FORMULA_WORDS.iter().any(|w| alt.contains(w))
}

/// Root-relative paths live on the image host; anything else that is not
/// already absolute is relative to the site base.
pub fn resolve_image_url(src: &str, base: &str, image_host: &str) -> String {
    let src = src.trim();
    let joined = if src.starts_with('/') {
        Url::parse(image_host).and_then(|u| u.join(src))
    } else if src.starts_with("http") {
        return src.to_string();
    } else {
        Url::parse(base).and_then(|u| u.join(src))
    };
    joined.map(|u| u.to_string()).unwrap_or_else(|_| src.to_string())
}

/// `<sanitized owner title>_<basename>`, with periods in the title flattened
/// too so the extension stays the only one.
pub fn local_image_name(owner_title: &str, image_url: &str) -> String {
    let title = sanitize(owner_title).replace('.', "_");
    let basename = Url::parse(image_url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty() && name.contains('.'))
        .map(|name| sanitize(&name))
        .unwrap_or_else(|| DEFAULT_BASENAME.to_string());
    format!("{}_{}", title, basename)
}

pub fn placeholder(local_filename: &str, description: &str) -> String {
    let description = if description.trim().is_empty() {
        DEFAULT_DESCRIPTION
    } else {
        description.trim()
    };
    format!("[IMAGE: {} - {}]", local_filename, description)
}

/// Downloads formula images into `images_dir` and swaps each one in the
/// document for a text placeholder at the same position.
pub struct FormulaExtractor<'a, F: Fetch + ?Sized> {
    fetcher: &'a F,
    images_dir: &'a Path,
    base_url: &'a str,
    image_host: &'a str,
}

impl<'a, F: Fetch + ?Sized> FormulaExtractor<'a, F> {
    pub fn new(fetcher: &'a F, images_dir: &'a Path, base_url: &'a str, image_host: &'a str) -> Self {
        FormulaExtractor {
            fetcher,
            images_dir,
            base_url,
            image_host,
        }
    }

    pub fn extract(&self, doc: &mut Html, owner: &Node) -> Vec<ExtractedImage> {
        let candidates: Vec<_> = doc
            .select(&IMAGE)
            .filter_map(|img| {
                let src = img.value().attr("src")?.to_string();
                let alt = img.value().attr("alt").unwrap_or("").to_string();
                let parent_classes: Vec<&str> = img
                    .parent()
                    .and_then(ElementRef::wrap)
                    .map(|p| p.value().classes().collect())
                    .unwrap_or_default();
                qualifies(&alt, &parent_classes).then(|| (img.id(), src, alt))
            })
            .collect();

        let mut images = Vec::new();
        for (id, src, alt) in candidates {
            let url = resolve_image_url(&src, self.base_url, self.image_host);
            let local = local_image_name(&owner.title, &url);

            if let Err(err) = self.download(&url, &local) {
                // The <img> stays in the document.
                warn!(url = %url, error = %err, "image download failed");
                continue;
            }
            info!(file = %local, "downloaded image");

            let text = format!(" {} ", placeholder(&local, &alt));
            if let Some(mut node) = doc.tree.get_mut(id) {
                node.insert_before(scraper::Node::Text(scraper::node::Text { text: text.into() }));
                node.detach();
            }

            images.push(ExtractedImage {
                source_locator: url,
                local_filename: local,
                descriptive_text: alt,
                owner_title: owner.title.clone(),
                owner_path: owner.path.clone(),
            });
        }
        images
    }

    fn download(&self, url: &str, local: &str) -> anyhow::Result<()> {
        let bytes = self.fetcher.get_bytes(url)?;
        fs::create_dir_all(self.images_dir)?;
        fs::write(self.images_dir.join(local), bytes)?;
        Ok(())
    }
}
