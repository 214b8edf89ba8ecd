//! Engine configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the engine can run with zero
//! configuration in tests and embedded deployments.

use std::path::PathBuf;

/// Which search index strategy the engine maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchStrategyKind {
    /// SQLite FTS5 shadow table kept consistent by triggers.
    #[default]
    FullText,
    /// Hand-rolled posting lists (word / contact / month -> archive ids).
    Inverted,
}

impl SearchStrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStrategyKind::FullText => "fulltext",
            SearchStrategyKind::Inverted => "inverted",
        }
    }
}

/// Archival engine configuration.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Database file path. `None` uses the platform data directory.
    /// Env: `MEMOIRE_DB_PATH`
    pub db_path: Option<PathBuf>,

    /// Estimated-size cutoff (bytes) above which a whole archive is
    /// compressed before storage.
    /// Env: `MEMOIRE_COMPRESSION_THRESHOLD`
    /// Default: `10240` (10 KiB)
    pub compression_threshold: usize,

    /// zstd compression level.
    /// Env: `MEMOIRE_COMPRESSION_LEVEL`
    /// Default: `3`
    pub compression_level: i32,

    /// Bounded LRU capacity for fully loaded archives.
    /// Env: `MEMOIRE_ARCHIVE_CACHE_CAP`
    /// Default: `50`
    pub archive_cache_capacity: usize,

    /// Bounded LRU capacity for cached search results.
    /// Env: `MEMOIRE_SEARCH_CACHE_CAP`
    /// Default: `20`
    pub search_cache_capacity: usize,

    /// Search index strategy.
    /// Env: `MEMOIRE_SEARCH_STRATEGY` (`fulltext` / `inverted`)
    /// Default: `fulltext`
    pub search_strategy: SearchStrategyKind,

    /// Result cap applied by `search_archives` when the caller passes no
    /// explicit limit.
    /// Env: `MEMOIRE_SEARCH_LIMIT`
    /// Default: `50`
    pub default_search_limit: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            compression_threshold: 10 * 1024,
            compression_level: 3,
            archive_cache_capacity: 50,
            search_cache_capacity: 20,
            search_strategy: SearchStrategyKind::FullText,
            default_search_limit: 50,
        }
    }
}

impl ArchiveConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("MEMOIRE_DB_PATH") {
            config.db_path = Some(PathBuf::from(path));
        }

        if let Ok(val) = std::env::var("MEMOIRE_COMPRESSION_THRESHOLD") {
            match val.parse::<usize>() {
                Ok(n) => config.compression_threshold = n,
                Err(_) => {
                    tracing::warn!(
                        value = %val,
                        "Invalid MEMOIRE_COMPRESSION_THRESHOLD, using default"
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("MEMOIRE_COMPRESSION_LEVEL") {
            match val.parse::<i32>() {
                Ok(n) => config.compression_level = n,
                Err(_) => {
                    tracing::warn!(
                        value = %val,
                        "Invalid MEMOIRE_COMPRESSION_LEVEL, using default"
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("MEMOIRE_ARCHIVE_CACHE_CAP") {
            if let Ok(n) = val.parse::<usize>() {
                config.archive_cache_capacity = n;
            }
        }

        if let Ok(val) = std::env::var("MEMOIRE_SEARCH_CACHE_CAP") {
            if let Ok(n) = val.parse::<usize>() {
                config.search_cache_capacity = n;
            }
        }

        if let Ok(val) = std::env::var("MEMOIRE_SEARCH_STRATEGY") {
            match val.to_ascii_lowercase().as_str() {
                "fulltext" | "fts" => config.search_strategy = SearchStrategyKind::FullText,
                "inverted" => config.search_strategy = SearchStrategyKind::Inverted,
                other => {
                    tracing::warn!(
                        value = %other,
                        "Unknown MEMOIRE_SEARCH_STRATEGY, using default"
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("MEMOIRE_SEARCH_LIMIT") {
            if let Ok(n) = val.parse::<usize>() {
                if n > 0 {
                    config.default_search_limit = n;
                }
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ArchiveConfig::default();
        assert_eq!(config.compression_threshold, 10 * 1024);
        assert_eq!(config.archive_cache_capacity, 50);
        assert_eq!(config.search_cache_capacity, 20);
        assert_eq!(config.search_strategy, SearchStrategyKind::FullText);
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!(SearchStrategyKind::FullText.as_str(), "fulltext");
        assert_eq!(SearchStrategyKind::Inverted.as_str(), "inverted");
    }
}
