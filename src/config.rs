use anyhow::{Context, Result};
use clap::Parser;
use clap::builder::{BoolishValueParser, PossibleValuesParser};
use serde::Deserialize;
use serde_yaml;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::zotero::{ANNOTATION_COLORS, LibraryType, ZoteroQuery};

#[derive(Parser, Debug, Default)]
#[command(name = "zotwise")]
#[command(about = "Uploads Zotero annotations and notes to Readwise", long_about = None)]
pub struct Cli {
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,

    /// Only include Zotero items changed since the last successful run
    #[arg(long)]
    pub use_since: bool,

    /// y/yes/true or n/no/false
    #[arg(long, value_parser = BoolishValueParser::new())]
    pub include_annotations: Option<bool>,

    #[arg(long, value_parser = BoolishValueParser::new())]
    pub include_notes: Option<bool>,

    /// Only upload annotations with this colour (repeatable)
    #[arg(long = "filter-color", value_parser = PossibleValuesParser::new(ANNOTATION_COLORS))]
    pub filter_colors: Vec<String>,

    #[arg(long, value_enum)]
    pub library_type: Option<LibraryType>,

    /// Convert and report without uploading or moving the watermark
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long)]
    pub json_logs: bool,
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".zotwise")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

#[derive(Debug, Deserialize, Clone)]
pub struct Readwise {
    pub token: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Zotero {
    pub api_key: String,
    pub library_id: String,
    #[serde(default)]
    pub library_type: LibraryType,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Sync {
    #[serde(default = "default_true")]
    pub include_annotations: bool,
    #[serde(default)]
    pub include_notes: bool,
    #[serde(default)]
    pub filter_colors: Vec<String>,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for Sync {
    fn default() -> Self {
        Self {
            include_annotations: true,
            include_notes: false,
            filter_colors: Vec::new(),
            data_dir: None,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub readwise: Readwise,
    pub zotero: Zotero,
    #[serde(default)]
    pub sync: Sync,
}

/// Run options after command-line flags have been layered over the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub use_since: bool,
    pub dry_run: bool,
    pub query: ZoteroQuery,
}

impl Config {
    pub fn new(path: &str) -> Result<Self> {
        let cfg = Config::load_config(path)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn load_config(path: &str) -> Result<Config> {
        let yaml_str =
            fs::read_to_string(path).with_context(|| format!("failed to read config {}", path))?;
        Config::from_yaml(&yaml_str)
    }

    pub fn from_yaml(yaml_str: &str) -> Result<Config> {
        let yaml_with_env = Config::substitute_env_vars(yaml_str)?;
        let config: Config = serde_yaml::from_str(&yaml_with_env)?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.readwise.token.trim().is_empty() {
            anyhow::bail!("readwise.token is empty");
        }
        if self.zotero.api_key.trim().is_empty() {
            anyhow::bail!("zotero.api_key is empty");
        }
        if self.zotero.library_id.trim().is_empty() {
            anyhow::bail!("zotero.library_id is empty");
        }
        for color in &self.sync.filter_colors {
            if !ANNOTATION_COLORS.contains(&color.to_lowercase().as_str()) {
                anyhow::bail!("sync.filter_colors contains unknown colour {}", color);
            }
        }
        Ok(())
    }

    /// Watermark and failed items live next to the config file unless
    /// `sync.data_dir` says otherwise.
    pub fn data_dir(&self, config_path: &Path) -> PathBuf {
        match &self.sync.data_dir {
            Some(dir) => dir.clone(),
            None => config_path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    pub fn run_options(&self, cli: &Cli) -> RunOptions {
        let filter_colors = if cli.filter_colors.is_empty() {
            self.sync.filter_colors.clone()
        } else {
            cli.filter_colors.clone()
        };

        RunOptions {
            use_since: cli.use_since,
            dry_run: cli.dry_run,
            query: ZoteroQuery {
                include_annotations: cli
                    .include_annotations
                    .unwrap_or(self.sync.include_annotations),
                include_notes: cli.include_notes.unwrap_or(self.sync.include_notes),
                filter_colors,
                since: 0,
            },
        }
    }

    pub fn library_type(&self, cli: &Cli) -> LibraryType {
        cli.library_type.unwrap_or(self.zotero.library_type)
    }

    fn substitute_env_vars(yaml_str: &str) -> Result<String> {
        let mut result = yaml_str.to_string();
        let mut offset = 0;

        while let Some(start) = result[offset..].find("${") {
            let actual_start = offset + start;
            if let Some(end) = result[actual_start..].find("}") {
                let var_name = &result[actual_start + 2..actual_start + end];

                // ${VAR:-default}
                let env_value = if let Some(default_start) = var_name.find(":-") {
                    let actual_var = &var_name[..default_start];
                    let default_val = &var_name[default_start + 2..];
                    env::var(actual_var).unwrap_or_else(|_| default_val.to_string())
                } else {
                    env::var(var_name).unwrap_or_else(|_| {
                        tracing::warn!("environment variable '{}' not found", var_name);
                        String::new()
                    })
                };

                result.replace_range(actual_start..actual_start + end + 1, &env_value);
                offset = actual_start + env_value.len();
            } else {
                break;
            }
        }

        Ok(result)
    }
}
