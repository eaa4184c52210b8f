use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::node::{NodeFilter, NodeKind};

pub const DEFAULT_CONFIG_FILE: &str = "legal_scraper.toml";
pub const ENV_PREFIX: &str = "LEGAL_SCRAPER";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteKind {
    /// Statutory codes site: expandable branch listings, flat section pages.
    Leginfo,
    /// Regulations site: browse lists, block-structured documents.
    Westlaw,
}

#[derive(Debug, Error)]
#[error("target '{name}': {reason}")]
pub struct TargetError {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlTarget {
    pub name: String,
    pub site: SiteKind,
    pub code: String,
    pub code_name: String,
    pub division: String,
    #[serde(default)]
    pub chapter: Option<String>,
    /// Display title of the root node; derived from the code when absent.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub root_url: Option<String>,
    /// Only descend into these parts.
    #[serde(default)]
    pub parts: Option<Vec<String>>,
    /// Extra fixed lines for every leaf file header.
    #[serde(default)]
    pub header_lines: Vec<String>,
}

impl CrawlTarget {
    pub fn filter(&self) -> Option<NodeFilter> {
        self.parts
            .as_ref()
            .filter(|parts| !parts.is_empty())
            .map(|parts| NodeFilter::new(NodeKind::Part, parts))
    }

    pub fn error(&self, reason: impl Into<String>) -> TargetError {
        TargetError {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub delay_ms: u64,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub targets: Vec<CrawlTarget>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            output_dir: PathBuf::from("california_legal_codes"),
            delay_ms: 1000,
            timeout_secs: 30,
            user_agent: USER_AGENT.to_string(),
            targets: default_targets(),
        }
    }
}

impl Settings {
    /// Defaults, then the config file (required only when given explicitly),
    /// then `LEGAL_SCRAPER_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::from(file).required(path.is_some()))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// All targets when `names` is empty, otherwise the named ones in the
    /// order given.
    pub fn select_targets(&self, names: &[String]) -> Result<Vec<&CrawlTarget>, TargetError> {
        if names.is_empty() {
            return Ok(self.targets.iter().collect());
        }
        names
            .iter()
            .map(|name| {
                self.targets
                    .iter()
                    .find(|t| &t.name == name)
                    .ok_or_else(|| TargetError {
                        name: name.clone(),
                        reason: "not configured".to_string(),
                    })
            })
            .collect()
    }
}

fn default_targets() -> Vec<CrawlTarget> {
    vec![
        CrawlTarget {
            name: "WAT_division_6".to_string(),
            site: SiteKind::Leginfo,
            code: "WAT".to_string(),
            code_name: "Water Code".to_string(),
            division: "6".to_string(),
            chapter: None,
            title: Some(
                "CONSERVATION, DEVELOPMENT, AND UTILIZATION OF STATE WATER RESOURCES".to_string(),
            ),
            root_url: None,
            parts: None,
            header_lines: Vec::new(),
        },
        CrawlTarget {
            name: "HSC_division_104".to_string(),
            site: SiteKind::Leginfo,
            code: "HSC".to_string(),
            code_name: "Health and Safety Code".to_string(),
            division: "104".to_string(),
            chapter: None,
            title: None,
            root_url: None,
            parts: Some(vec!["12".to_string()]),
            header_lines: Vec::new(),
        },
        CrawlTarget {
            name: "CCR_title_23_chapter_3_5".to_string(),
            site: SiteKind::Westlaw,
            code: "CCR".to_string(),
            code_name: "California Code of Regulations".to_string(),
            division: "3".to_string(),
            chapter: Some("3.5".to_string()),
            title: Some("Chapter 3.5. Urban Water Use Efficiency and Conservation".to_string()),
            root_url: Some(
                "https://shared-govt.westlaw.com/calregs/Browse/Home/California/CaliforniaCodeofRegulations?guid=IC6CFA5735B6E11EC9451000D3A7C4BC3&originationContext=documenttoc&transitionType=Default&contextData=(sc.Default)".to_string(),
            ),
            parts: None,
            header_lines: vec![
                "Title 23. Waters".to_string(),
                "Division 3. State Water Resources Control Board and Regional Water Quality Control Boards".to_string(),
                "Chapter 3.5. Urban Water Use Efficiency and Conservation".to_string(),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_both_sites() {
        let settings = Settings::default();
        assert_eq!(settings.delay(), Duration::from_secs(1));
        assert_eq!(settings.timeout(), Duration::from_secs(30));
        assert!(settings.targets.iter().any(|t| t.site == SiteKind::Leginfo));
        assert!(settings.targets.iter().any(|t| t.site == SiteKind::Westlaw));
    }

    #[test]
    fn part_filter_from_target() {
        let settings = Settings::default();
        let hsc = &settings.select_targets(&["HSC_division_104".to_string()]).unwrap()[0];
        let filter = hsc.filter().unwrap();
        assert_eq!(filter.kind, NodeKind::Part);
        assert_eq!(filter.labels, vec!["12"]);

        let wat = &settings.targets[0];
        assert!(wat.filter().is_none());
    }

    #[test]
    fn unknown_target_is_rejected() {
        let settings = Settings::default();
        let err = settings.select_targets(&["nope".to_string()]).unwrap_err();
        assert_eq!(err.name, "nope");
        assert_eq!(settings.select_targets(&[]).unwrap().len(), settings.targets.len());
    }

    #[test]
    fn load_reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scraper.toml");
        std::fs::write(
            &path,
            r#"
output_dir = "out"
delay_ms = 0

[[targets]]
name = "water"
site = "leginfo"
code = "WAT"
code_name = "Water Code"
division = "6"
parts = ["1", "2"]
"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.output_dir, PathBuf::from("out"));
        assert_eq!(settings.delay_ms, 0);
        assert_eq!(settings.timeout_secs, 30);
        assert_eq!(settings.targets.len(), 1);
        assert_eq!(settings.targets[0].name, "water");
        assert_eq!(settings.targets[0].parts.as_ref().unwrap().len(), 2);
    }
}
