//! readat-cache: run a read workload against a file through a block cache.
//!
//! Reports how many bytes and requests the cache absorbed, optionally drawing
//! the cache's occupancy after every miss.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use prometheus::{Registry, TextEncoder};
use tracing::info;

use readat_cache::config::{Cli, Config};
use readat_cache::source::file;
use readat_cache::workload::run_workload;
use readat_cache::{BrailleGraph, CachedReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "readat_cache=debug"
    } else {
        "readat_cache=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("readat-cache v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let mut config = Config::load(&cli.config)?;
    config.apply_cli(&cli);
    config.validate()?;

    info!(
        block_size = config.cache.block_size,
        capacity_blocks = config.cache.capacity_blocks,
        cache_bytes = config.cache_bytes(),
        "Configuration loaded"
    );

    let (source, content_len) = file::open(&cli.file)
        .with_context(|| format!("failed to open {}", cli.file.display()))?;

    let mut reader = CachedReader::from_config(source, &config.cache)?;
    if config.graph.enabled {
        let graph = BrailleGraph::stdout(config.graph.resolved_width()?, content_len)?;
        reader = reader.with_observer(graph);
    }

    let registry = Registry::new();
    reader.register_metrics(&registry)?;

    let reader = Arc::new(reader);
    let report = run_workload(Arc::clone(&reader), content_len, &config.workload).await?;

    // Dropping the reader drops the graph, which ends its last line.
    drop(reader);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let stats = report.stats;
        println!(
            "reads: {} ({} bytes, {} short) in {:.3}s",
            report.reads,
            report.bytes,
            report.short_reads,
            report.elapsed.as_secs_f64()
        );
        println!(
            "served {} bytes / {} requests; fetched {} bytes / {} requests",
            stats.cache_bytes, stats.cache_requests, stats.source_bytes, stats.source_requests
        );
        println!(
            "improvement: {:.2}x bytes, {:.2}x requests",
            stats.byte_improvement(),
            stats.request_improvement()
        );
    }

    if cli.metrics {
        let mut text = String::new();
        TextEncoder::new().encode_utf8(&registry.gather(), &mut text)?;
        print!("{text}");
    }

    Ok(())
}
