// src/config.rs

use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::error::{IngestError, Result};
use crate::ingest::ViolationPolicy;
use crate::schema::{self, Category, DatasetDescriptor};

pub const ENV_CONFIG: &str = "LAKELOAD_CONFIG";
pub const ENV_WORKSPACE: &str = "LAKELOAD_WORKSPACE";
pub const ENV_LAKEHOUSE: &str = "LAKELOAD_LAKEHOUSE";
pub const ENV_ROOT: &str = "LAKELOAD_ROOT";
pub const ENV_TABLES: &str = "LAKELOAD_TABLES";
pub const ENV_CONCURRENCY: &str = "LAKELOAD_CONCURRENCY";
pub const ENV_ON_VIOLATION: &str = "LAKELOAD_ON_VIOLATION";
pub const ENV_BATCH_ROWS: &str = "LAKELOAD_BATCH_ROWS";

pub const DEFAULT_BATCH_ROWS: usize = 65_536; // 64k rows per row group
pub const MAX_BATCH_ROWS: usize = 1 << 20;
pub const MAX_CONCURRENCY: usize = 64;

/// Runtime settings. Loaded from an optional YAML file, then environment overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Selects the logical storage root.
    pub workspace_identifier: String,
    /// Selects the storage container inside the workspace.
    pub lakehouse_identifier: String,
    /// Local directory that stands in for the lake.
    pub lake_root: PathBuf,
    /// Tables to load; `None` means the default five.
    pub tables: Option<Vec<String>>,
    /// Number of tables loaded at once.
    pub concurrency: usize,
    pub on_violation: ViolationPolicy,
    pub batch_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_identifier: "Fabric_CI_CD_01_PROD".to_string(),
            lakehouse_identifier: "lakehouse_001".to_string(),
            lake_root: PathBuf::from("lake"),
            tables: None,
            concurrency: 1,
            on_violation: ViolationPolicy::Strict,
            batch_rows: DEFAULT_BATCH_ROWS,
        }
    }
}

impl Config {
    /// Load from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load using `lookup` in place of the environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = match lookup(ENV_CONFIG).filter(|p| !p.trim().is_empty()) {
            Some(path) => Self::from_yaml_file(Path::new(path.trim()))?,
            None => Self::default(),
        };
        cfg.apply_overrides(&lookup)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| IngestError::io(path, e))?;
        Self::from_yaml_str(&text)
            .map_err(|e| IngestError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| IngestError::Config(e.to_string()))
    }

    fn apply_overrides<F>(&mut self, lookup: &F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_WORKSPACE) {
            self.workspace_identifier = v.trim().to_string();
        }
        if let Some(v) = lookup(ENV_LAKEHOUSE) {
            self.lakehouse_identifier = v.trim().to_string();
        }
        if let Some(v) = lookup(ENV_ROOT) {
            self.lake_root = PathBuf::from(v.trim());
        }
        if let Some(v) = lookup(ENV_TABLES) {
            let tables: Vec<String> = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            self.tables = Some(tables);
        }
        if let Some(v) = lookup(ENV_CONCURRENCY) {
            self.concurrency = parse_number(ENV_CONCURRENCY, &v)?;
        }
        if let Some(v) = lookup(ENV_ON_VIOLATION) {
            self.on_violation = v.parse()?;
        }
        if let Some(v) = lookup(ENV_BATCH_ROWS) {
            self.batch_rows = parse_number(ENV_BATCH_ROWS, &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        check_identifier("workspace_identifier", &self.workspace_identifier)?;
        check_identifier("lakehouse_identifier", &self.lakehouse_identifier)?;
        if !(1..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(IngestError::Config(format!(
                "concurrency must be between 1 and {MAX_CONCURRENCY}, got {}",
                self.concurrency
            )));
        }
        if !(1..=MAX_BATCH_ROWS).contains(&self.batch_rows) {
            return Err(IngestError::Config(format!(
                "batch_rows must be between 1 and {MAX_BATCH_ROWS}, got {}",
                self.batch_rows
            )));
        }
        if let Some(tables) = &self.tables {
            if tables.is_empty() {
                return Err(IngestError::Config("tables list is empty".into()));
            }
        }
        Ok(())
    }

    /// Storage root: `<lake_root>/<workspace>/<lakehouse>.Lakehouse`.
    pub fn paths(&self) -> LakePaths {
        LakePaths::new(
            self.lake_root
                .join(&self.workspace_identifier)
                .join(format!("{}.Lakehouse", self.lakehouse_identifier)),
        )
    }

    /// OneLake address of the same lakehouse, for logs.
    pub fn onelake_uri(&self) -> String {
        format!(
            "abfss://{}@onelake.dfs.fabric.microsoft.com/{}.Lakehouse",
            self.workspace_identifier, self.lakehouse_identifier
        )
    }

    /// Descriptors to load, in run order. Unknown names fail with `SchemaNotFound`.
    pub fn datasets(&self) -> Result<Vec<DatasetDescriptor>> {
        match &self.tables {
            None => Ok(schema::default_datasets()),
            Some(names) => names
                .iter()
                .map(|n| schema::descriptor(n).copied())
                .collect(),
        }
    }
}

fn parse_number(key: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse()
        .map_err(|_| IngestError::Config(format!("{key}: expected a positive integer, got {raw:?}")))
}

fn check_identifier(key: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(IngestError::Config(format!("{key} must not be empty")));
    }
    if value.contains(['/', '\\']) || value == "." || value == ".." {
        return Err(IngestError::Config(format!(
            "{key} {value:?} must not contain path separators"
        )));
    }
    Ok(())
}

/// Resolved source and destination locations under one lakehouse root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LakePaths {
    root: PathBuf,
}

impl LakePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/Files/Raw`
    pub fn files_root(&self) -> PathBuf {
        self.root.join("Files").join("Raw")
    }

    /// `<root>/Tables`
    pub fn tables_root(&self) -> PathBuf {
        self.root.join("Tables")
    }

    /// `<files_root>/<table_name>.csv`
    pub fn source_path(&self, table_name: &str) -> PathBuf {
        self.files_root().join(format!("{}.csv", table_name))
    }

    /// `<tables_root>/<category>_<table_name>`
    pub fn table_path(&self, category: Category, table_name: &str) -> PathBuf {
        self.tables_root()
            .join(format!("{}_{}", category, table_name))
    }
}
