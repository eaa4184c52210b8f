use std::time::Duration;

use tracing::{debug, info, warn};

use crate::fetch::{pause, Fetch, FetchError};
use crate::node::{Node, NodeFilter};
use crate::sites::SiteSchema;

/// Levels below the root that discovery will expand.
pub const MAX_DEPTH: usize = 8;

/// Pre-order expansion of a table of contents whose listing pages each show
/// one level of children.
pub struct Discovery<'a, F: Fetch + ?Sized> {
    fetcher: &'a F,
    schema: &'a dyn SiteSchema,
    filter: Option<&'a NodeFilter>,
    delay: Duration,
}

impl<'a, F: Fetch + ?Sized> Discovery<'a, F> {
    pub fn new(fetcher: &'a F, schema: &'a dyn SiteSchema) -> Self {
        Discovery {
            fetcher,
            schema,
            filter: None,
            delay: Duration::ZERO,
        }
    }

    pub fn with_filter(mut self, filter: Option<&'a NodeFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Expand `root` until only leaves and childless listings remain.
    pub fn discover(&self, mut root: Node) -> Node {
        self.expand(&mut root, 0);
        root
    }

    /// Fetch one listing page and read its child descriptors.
    pub fn expand_children(&self, node: &Node) -> Result<Vec<Node>, FetchError> {
        let fetched = self.fetcher.fetch(&node.locator);
        pause(self.delay);
        Ok(self.schema.child_entries(&fetched?, node))
    }

    fn expand(&self, node: &mut Node, depth: usize) {
        if node.is_leaf() {
            return;
        }
        if depth >= MAX_DEPTH {
            warn!(title = %node.title, url = %node.locator, "depth limit reached, not expanding");
            return;
        }

        debug!(kind = %node.kind, title = %node.title, url = %node.locator, "expanding");
        let children = match self.expand_children(node) {
            Ok(children) => children,
            Err(err) => {
                // The subtree stays empty; siblings carry on.
                warn!(title = %node.title, url = %err.url(), error = %err, "listing fetch failed");
                return;
            }
        };

        if children.is_empty() {
            info!(kind = %node.kind, title = %node.title, "no children found");
        }

        for mut child in children {
            if let Some(filter) = self.filter {
                if !filter.admits(&child) {
                    debug!(title = %child.title, "filtered out");
                    continue;
                }
            }
            info!(
                kind = %child.kind,
                title = %child.title,
                range = child.range.as_deref().unwrap_or(""),
                leaf = child.is_leaf(),
                "found"
            );
            self.expand(&mut child, depth + 1);
            node.children.push(child);
        }
    }
}
