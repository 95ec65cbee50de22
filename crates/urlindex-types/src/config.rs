//! Configuration inputs (§6, §9). Recognised options are exactly the
//! fields below, loaded from a YAML file via the `config` crate the way
//! `resolved::settings::Settings` loads the DNS server's configuration.

use serde::Deserialize;

const DEFAULT_PARTITION_BUFFER_SIZE: u64 = 128 * 1024 * 1024;
const DEFAULT_GLOBAL_BUFFER_LIMIT: u64 = 2 * 1024 * 1024 * 1024;
const DEFAULT_COMPRESSION_LEVEL: i32 = 6;
const DEFAULT_POSTINGS_SHARDS: u32 = 1024;
const DEFAULT_MAX_LIMIT: u32 = 10_000;
const DEFAULT_VERSION_RETENTION_COUNT: u32 = 3;
const DEFAULT_DEFAULT_LIMIT: u32 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    pub base_path: String,

    #[serde(default = "default_partition_buffer_size")]
    pub partition_buffer_size: u64,

    #[serde(default = "default_global_buffer_limit")]
    pub global_buffer_limit: u64,

    #[serde(default = "default_compression_level")]
    pub compression_level: i32,

    #[serde(default = "default_postings_shards")]
    pub postings_shards: u32,

    #[serde(default = "default_max_limit")]
    pub max_limit: u32,

    #[serde(default = "default_default_limit")]
    pub default_limit: u32,

    #[serde(default = "default_version_retention_count")]
    pub version_retention_count: u32,
}

fn default_partition_buffer_size() -> u64 {
    DEFAULT_PARTITION_BUFFER_SIZE
}
fn default_global_buffer_limit() -> u64 {
    DEFAULT_GLOBAL_BUFFER_LIMIT
}
fn default_compression_level() -> i32 {
    DEFAULT_COMPRESSION_LEVEL
}
fn default_postings_shards() -> u32 {
    DEFAULT_POSTINGS_SHARDS
}
fn default_max_limit() -> u32 {
    DEFAULT_MAX_LIMIT
}
fn default_default_limit() -> u32 {
    DEFAULT_DEFAULT_LIMIT
}
fn default_version_retention_count() -> u32 {
    DEFAULT_VERSION_RETENTION_COUNT
}

impl Config {
    /// Load from a YAML file at `path`.
    ///
    /// # Errors
    ///
    /// If the file is missing, malformed, or missing `base_path`.
    pub fn from_file(path: &str) -> Result<Self, ::config::ConfigError> {
        ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .build()?
            .try_deserialize()
    }

    /// Clamp a requested `limit` to the configured maximum (§4.11,
    /// `OverCapacity`).
    pub fn clamp_limit(&self, limit: u32) -> u32 {
        limit.min(self.max_limit)
    }

    pub fn index_root(&self) -> String {
        format!("{}/index", self.base_path)
    }

    pub fn columnar_root(&self) -> String {
        format!("{}/urls", self.base_path)
    }

    pub fn registry_path(&self) -> String {
        format!("{}/registry/dataset_registry.json", self.base_path)
    }

    pub fn manifest_path(&self) -> String {
        format!("{}/index/manifest.json", self.base_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_limit_caps_at_max() {
        let config = Config {
            base_path: "/tmp/x".to_string(),
            partition_buffer_size: DEFAULT_PARTITION_BUFFER_SIZE,
            global_buffer_limit: DEFAULT_GLOBAL_BUFFER_LIMIT,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            postings_shards: DEFAULT_POSTINGS_SHARDS,
            max_limit: 10_000,
            default_limit: DEFAULT_DEFAULT_LIMIT,
            version_retention_count: DEFAULT_VERSION_RETENTION_COUNT,
        };

        assert_eq!(config.clamp_limit(500), 500);
        assert_eq!(config.clamp_limit(50_000), 10_000);
    }
}
