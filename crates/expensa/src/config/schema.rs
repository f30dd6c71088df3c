use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::secrets::SecretSource;

/// Extensions accepted for upload when the config does not say otherwise.
pub const DEFAULT_ALLOWED_FORMATS: &[&str] = &["pdf", "png", "jpg", "jpeg"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub formats: FormatsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub push: PushConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            limits: LimitsConfig::default(),
            formats: FormatsConfig::default(),
            storage: StorageConfig::default(),
            database: DatabaseConfig::default(),
            render: RenderConfig::default(),
            notify: NotifyConfig::default(),
            backend: BackendConfig::default(),
            push: PushConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitsConfig {
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,
    #[serde(default = "default_min_bytes")]
    pub min_bytes: usize,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_max_documents() -> usize {
    10
}

fn default_min_bytes() -> usize {
    1
}

fn default_max_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_documents: default_max_documents(),
            min_bytes: default_min_bytes(),
            max_bytes: default_max_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatsConfig {
    #[serde(default = "default_allowed")]
    pub allowed: Vec<String>,
    /// Extensions the backend resolves inline (synchronous analysis).
    #[serde(default)]
    pub inline: Vec<String>,
}

fn default_allowed() -> Vec<String> {
    DEFAULT_ALLOWED_FORMATS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for FormatsConfig {
    fn default() -> Self {
        Self {
            allowed: default_allowed(),
            inline: Vec::new(),
        }
    }
}

impl FormatsConfig {
    pub fn allowed_set(&self) -> BTreeSet<String> {
        self.allowed.iter().map(|s| s.to_ascii_lowercase()).collect()
    }

    pub fn is_inline(&self, extension: &str) -> bool {
        self.inline
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: String,
    #[serde(default = "default_upload_prefix")]
    pub upload_prefix: String,
    #[serde(default = "default_raw_prefix")]
    pub raw_prefix: String,
    #[serde(default = "default_results_prefix")]
    pub results_prefix: String,
}

fn default_storage_root() -> String {
    "./data/objects".to_string()
}

fn default_upload_prefix() -> String {
    "analyse-expense".to_string()
}

fn default_raw_prefix() -> String {
    "preprocess".to_string()
}

fn default_results_prefix() -> String {
    "postprocess".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            upload_prefix: default_upload_prefix(),
            raw_prefix: default_raw_prefix(),
            results_prefix: default_results_prefix(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    /// SQLite file. Defaults to `~/.expensa/data/expensa.db`.
    #[serde(default)]
    pub path: Option<String>,
}

impl DatabaseConfig {
    pub fn resolved_path(&self) -> Option<PathBuf> {
        match &self.path {
            Some(path) => Some(PathBuf::from(crate::secrets::expand_home(path))),
            None => crate::db::default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderConfig {
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: u32,
    #[serde(default = "default_render_workers")]
    pub workers: usize,
}

fn default_dpi() -> u32 {
    150
}

fn default_stroke_width() -> u32 {
    2
}

fn default_render_workers() -> usize {
    num_cpus::get()
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dpi: default_dpi(),
            stroke_width: default_stroke_width(),
            workers: default_render_workers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyConfig {
    #[serde(default = "default_notify_workers")]
    pub workers: usize,
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
}

fn default_notify_workers() -> usize {
    8
}

fn default_delivery_timeout_ms() -> u64 {
    5000
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            workers: default_notify_workers(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
        }
    }
}

impl NotifyConfig {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Where the backend writes its own raw output.
    #[serde(default)]
    pub output_location: Option<String>,
    /// Where the backend publishes job-completion signals.
    #[serde(default)]
    pub notification_target: Option<String>,
    #[serde(flatten)]
    pub auth: SecretSource,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(flatten)]
    pub auth: SecretSource,
}
