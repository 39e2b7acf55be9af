//! Runtime configuration for readat-cache.
//!
//! Configuration can be loaded from a JSON file or constructed programmatically.
//! Command-line flags override values from the file.

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::cache::CacheError;

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "readat-cache",
    about = "Run a read workload against a file through a block cache"
)]
pub struct Cli {
    /// File to read.
    pub file: PathBuf,

    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "readat-cache.json")]
    pub config: PathBuf,

    /// Block size in bytes.
    #[arg(long)]
    pub block_size: Option<u64>,

    /// Cache capacity in blocks.
    #[arg(long)]
    pub capacity: Option<usize>,

    /// Access pattern.
    #[arg(long, value_enum)]
    pub pattern: Option<AccessPattern>,

    /// Bytes per read request.
    #[arg(long)]
    pub read_size: Option<usize>,

    /// Number of concurrent workers.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Number of passes over the workload.
    #[arg(long)]
    pub passes: Option<usize>,

    /// Draw cache occupancy after every miss.
    #[arg(long)]
    pub graph: bool,

    /// Print counters in Prometheus text format.
    #[arg(long)]
    pub metrics: bool,

    /// Print the final stats as JSON.
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache geometry.
    pub cache: CacheConfig,

    /// Workload driven by the CLI.
    pub workload: WorkloadConfig,

    /// Occupancy graph.
    pub graph: GraphConfig,
}

/// Cache geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Bytes per block.
    pub block_size: u64,

    /// Maximum number of cached blocks.
    pub capacity_blocks: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            block_size: 64 * 1024,
            capacity_blocks: 256, // 16 MiB at the default block size
        }
    }
}

/// How the workload walks the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AccessPattern {
    /// Each worker scans the whole file front to back.
    Sequential,
    /// Each worker reads at seeded random offsets.
    Random,
}

/// Workload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    pub pattern: AccessPattern,

    /// Bytes per read request.
    pub read_size: usize,

    /// Reads per worker per pass (random pattern only).
    pub reads_per_worker: usize,

    /// Number of concurrent workers.
    pub workers: usize,

    /// Number of passes over the workload.
    pub passes: usize,

    /// Seed for the random pattern; worker `i` uses `seed + i`.
    pub seed: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            pattern: AccessPattern::Sequential,
            read_size: 4096,
            reads_per_worker: 10_000,
            workers: 4,
            passes: 1,
            seed: 0,
        }
    }
}

/// Occupancy graph settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub enabled: bool,

    /// Width in terminal cells (0 = the terminal's width).
    pub width: usize,
}

impl GraphConfig {
    /// Width of the graph in cells.
    ///
    /// A configured width is used as is. Otherwise stdout must be a terminal
    /// and the graph spans its current width.
    pub fn resolved_width(&self) -> Result<usize, CacheError> {
        resolve_width(
            self.width,
            io::stdout().is_terminal(),
            crossterm::terminal::size,
        )
    }
}

fn resolve_width(
    configured: usize,
    is_terminal: bool,
    terminal_size: impl FnOnce() -> io::Result<(u16, u16)>,
) -> Result<usize, CacheError> {
    if configured > 0 {
        return Ok(configured);
    }
    if !is_terminal {
        return Err(CacheError::InvalidConfig(
            "the occupancy graph needs stdout to be a terminal".to_string(),
        ));
    }
    let (columns, _rows) = terminal_size()
        .map_err(|e| CacheError::InvalidConfig(format!("cannot read terminal size: {e}")))?;
    if columns == 0 {
        return Err(CacheError::InvalidConfig(
            "terminal reports zero columns".to_string(),
        ));
    }
    Ok(usize::from(columns))
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Apply command-line overrides.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(block_size) = cli.block_size {
            self.cache.block_size = block_size;
        }
        if let Some(capacity) = cli.capacity {
            self.cache.capacity_blocks = capacity;
        }
        if let Some(pattern) = cli.pattern {
            self.workload.pattern = pattern;
        }
        if let Some(read_size) = cli.read_size {
            self.workload.read_size = read_size;
        }
        if let Some(workers) = cli.workers {
            self.workload.workers = workers;
        }
        if let Some(passes) = cli.passes {
            self.workload.passes = passes;
        }
        if cli.graph {
            self.graph.enabled = true;
        }
    }

    /// Reject values the reader or the workload cannot run with.
    pub fn validate(&self) -> Result<(), CacheError> {
        let checks = [
            (self.cache.block_size == 0, "cache.block_size must be positive"),
            (self.cache.capacity_blocks == 0, "cache.capacity_blocks must be positive"),
            (self.workload.read_size == 0, "workload.read_size must be positive"),
            (self.workload.workers == 0, "workload.workers must be positive"),
        ];
        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(CacheError::InvalidConfig((*message).to_string())),
            None => Ok(()),
        }
    }

    /// Bytes the cache can hold when full.
    pub fn cache_bytes(&self) -> u64 {
        self.cache.block_size * self.cache.capacity_blocks as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.cache.block_size, 64 * 1024);
        assert_eq!(cfg.cache_bytes(), 16 * 1024 * 1024);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{"cache": {"block_size": 4}, "workload": {"pattern": "random"}}"#)
                .unwrap();
        assert_eq!(cfg.cache.block_size, 4);
        assert_eq!(cfg.cache.capacity_blocks, 256);
        assert_eq!(cfg.workload.pattern, AccessPattern::Random);
        assert_eq!(cfg.workload.workers, 4);
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let mut cfg = Config::default();
        cfg.cache.capacity_blocks = 0;
        assert!(matches!(cfg.validate(), Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "readat-cache",
            "data.bin",
            "--block-size",
            "512",
            "--pattern",
            "random",
            "--graph",
        ]);
        let mut cfg = Config::default();
        cfg.apply_cli(&cli);
        assert_eq!(cfg.cache.block_size, 512);
        assert_eq!(cfg.workload.pattern, AccessPattern::Random);
        assert!(cfg.graph.enabled);
        assert_eq!(cfg.cache.capacity_blocks, 256);
    }

    #[test]
    fn test_graph_width_explicit() {
        let graph = GraphConfig {
            enabled: true,
            width: 40,
        };
        assert_eq!(graph.resolved_width().unwrap(), 40);
    }

    #[test]
    fn test_graph_width_from_terminal() {
        assert_eq!(resolve_width(0, true, || Ok((132, 40))).unwrap(), 132);
    }

    #[test]
    fn test_graph_requires_terminal() {
        let err = resolve_width(0, false, || Ok((132, 40))).unwrap_err();
        assert!(matches!(err, CacheError::InvalidConfig(_)));
    }

    #[test]
    fn test_graph_terminal_size_failure() {
        let err = resolve_width(0, true, || Err(io::Error::other("no tty"))).unwrap_err();
        assert!(err.to_string().contains("no tty"), "{err}");

        assert!(resolve_width(0, true, || Ok((0, 0))).is_err());
    }
}
