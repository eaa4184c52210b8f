use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::config::CrawlTarget;
use crate::discover::Discovery;
use crate::error::{CrawlError, ScrapeError};
use crate::fetch::{pause, Fetch};
use crate::formula::{ExtractedImage, FormulaExtractor};
use crate::node::Node;
use crate::output::{
    self, ensure_dir, leaf_filename, render_leaf, sanitize, write_text, ManifestNode, ScrapeManifest,
};
use crate::sites::{for_site, SiteSchema};

pub struct CrawlOptions {
    pub output_dir: PathBuf,
    pub delay: Duration,
    pub progress: bool,
}

/// What a target run produced.
#[derive(Debug)]
pub struct TargetReport {
    pub name: String,
    pub dir: PathBuf,
    pub total_leaves: usize,
    pub leaves_written: usize,
    pub total_images: usize,
}

/// State carried through one target's pre-order walk.
struct Run<'a> {
    target: &'a CrawlTarget,
    schema: &'a dyn SiteSchema,
    dir: PathBuf,
    images_dir: PathBuf,
    ordinal: usize,
    manifest: ScrapeManifest,
    progress: ProgressBar,
}

pub struct Crawler<'a, F: Fetch + ?Sized> {
    fetcher: &'a F,
    options: &'a CrawlOptions,
}

impl<'a, F: Fetch + ?Sized> Crawler<'a, F> {
    pub fn new(fetcher: &'a F, options: &'a CrawlOptions) -> Self {
        Crawler { fetcher, options }
    }

    pub fn target_dir(&self, target: &CrawlTarget) -> PathBuf {
        self.options.output_dir.join(sanitize(&target.name))
    }

    /// Expand the target's tree. A root with no children at all means the
    /// target or the site layout is wrong.
    pub fn discover_target(&self, target: &CrawlTarget) -> Result<Node, CrawlError> {
        let schema = for_site(target.site);
        self.discover_with(target, &*schema)
    }

    fn discover_with(&self, target: &CrawlTarget, schema: &dyn SiteSchema) -> Result<Node, CrawlError> {
        let root = schema.root(target)?;
        let filter = target.filter();
        info!(target = %target.name, site = schema.name(), url = %root.locator, "discovering");

        let tree = Discovery::new(self.fetcher, schema)
            .with_filter(filter.as_ref())
            .with_delay(self.options.delay)
            .discover(root);

        if tree.children.is_empty() {
            return Err(CrawlError::NothingDiscovered {
                title: tree.title,
                url: tree.locator,
            });
        }
        Ok(tree)
    }

    /// Dump a discovered tree to `structure.json` in the target's directory.
    pub fn write_structure(&self, target: &CrawlTarget, tree: &Node) -> Result<PathBuf, CrawlError> {
        let dir = self.target_dir(target);
        ensure_dir(&dir)?;
        let path = dir.join(output::STRUCTURE_FILE);
        output::write_json(&path, &ManifestNode::structure(tree))?;
        Ok(path)
    }

    /// Discover, then fetch and write every leaf in discovery order.
    pub fn run_target(&self, target: &CrawlTarget) -> Result<TargetReport, CrawlError> {
        let schema = for_site(target.site);
        let tree = self.discover_with(target, &*schema)?;

        let dir = self.target_dir(target);
        ensure_dir(&dir)?;
        let total_leaves = tree.leaf_count();
        info!(target = %target.name, leaves = total_leaves, dir = %dir.display(), "scraping leaves");

        let mut manifest = ScrapeManifest::new(target, &tree);
        manifest.total_leaves = total_leaves;
        let mut run = Run {
            target,
            schema: &*schema,
            images_dir: dir.join(output::IMAGES_DIR),
            dir,
            ordinal: 0,
            manifest,
            progress: self.progress_bar(total_leaves),
        };

        let mut ancestors = Vec::new();
        for child in &tree.children {
            let desc = self.visit(&mut run, child, &mut ancestors);
            run.manifest.nodes.push(desc);
        }
        run.progress.finish_and_clear();

        run.manifest.total_images = run.manifest.images.len();
        output::write_manifest(&run.dir, &run.manifest)?;

        info!(
            target = %target.name,
            written = run.manifest.leaves_written,
            total = total_leaves,
            images = run.manifest.total_images,
            "target done"
        );
        Ok(TargetReport {
            name: target.name.clone(),
            dir: run.dir,
            total_leaves,
            leaves_written: run.manifest.leaves_written,
            total_images: run.manifest.total_images,
        })
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.options.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta}) {msg}")
            .map(|s| s.progress_chars("=> "))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }

    fn visit<'t>(&self, run: &mut Run<'_>, node: &'t Node, ancestors: &mut Vec<&'t Node>) -> ManifestNode {
        let mut desc = ManifestNode::describe(node);

        if node.is_leaf() {
            run.ordinal += 1;
            run.progress.set_message(node.title.clone());
            match self.scrape_leaf(run, node, ancestors) {
                Ok((filename, images)) => {
                    desc.filename = Some(filename);
                    desc.images = images.iter().map(|i| i.local_filename.clone()).collect();
                    run.manifest.leaves_written += 1;
                    run.manifest.images.extend(images);
                }
                Err(err) => warn!(title = %node.title, url = %node.locator, error = %err, "skipping leaf"),
            }
            run.progress.inc(1);
            return desc;
        }

        ancestors.push(node);
        for child in &node.children {
            let child_desc = self.visit(run, child, ancestors);
            desc.children.push(child_desc);
        }
        ancestors.pop();
        desc
    }

    fn scrape_leaf(
        &self,
        run: &Run<'_>,
        leaf: &Node,
        ancestors: &[&Node],
    ) -> Result<(String, Vec<ExtractedImage>), ScrapeError> {
        let fetched = self.fetcher.fetch(&leaf.locator);
        pause(self.options.delay);
        let mut doc = fetched?;

        let images = FormulaExtractor::new(
            self.fetcher,
            &run.images_dir,
            run.schema.base_url(),
            run.schema.image_host(),
        )
        .extract(&mut doc, leaf);

        let body = run.schema.normalize(&doc);
        if body.iter().all(|line| line.trim().is_empty()) {
            return Err(ScrapeError::Parse {
                url: leaf.locator.clone(),
                reason: "no content found on page".to_string(),
            });
        }

        let filename = leaf_filename(leaf, run.ordinal);
        let contents = render_leaf(run.target, ancestors, leaf, &body);
        write_text(&run.dir.join(&filename), &contents)?;
        info!(file = %filename, lines = body.len(), images = images.len(), "saved");
        Ok((filename, images))
    }
}
