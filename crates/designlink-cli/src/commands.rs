//! Subcommand implementations
//!
//! Each command builds the transport stack from `ClientConfig`, runs, and
//! reports `Ok(true)` on success so `main` can pick the exit code.

use designlink_core::{
    CachedTransport, ClientConfig, ConsoleProgressSink, ExtractOptions, ExtractionInput,
    MemoryCache, ProgressiveExtractor, RpcTransport, SseRpcClient,
};
use std::sync::Arc;

use crate::render;
use crate::OutputFormat;

fn build_transport(config: ClientConfig) -> Result<CachedTransport<SseRpcClient>, String> {
    let ttl = config.cache_ttl();
    let client = SseRpcClient::new(config).map_err(|e| e.to_string())?;
    Ok(CachedTransport::new(client, Arc::new(MemoryCache::new()), ttl))
}

/// Run one extraction and print the report
pub async fn run_extract(
    config: ClientConfig,
    url: String,
    options: ExtractOptions,
    format: OutputFormat,
) -> Result<bool, String> {
    tracing::info!("Extracting {} via {}", url, config.base_url);

    let json_output = matches!(format, OutputFormat::Json);
    let transport = build_transport(config)?;
    let extractor = ProgressiveExtractor::new(Arc::new(transport));
    let sink = ConsoleProgressSink::new(json_output);

    let report = extractor
        .extract(ExtractionInput::Url { url, options }, &sink)
        .await?;

    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Failed to serialize report: {e}"))?,
        OutputFormat::Text => render::report_text(&report),
    };
    println!("{rendered}");

    Ok(report.success)
}

/// Probe the service once
pub async fn run_ping(config: ClientConfig) -> Result<bool, String> {
    let base_url = config.base_url.clone();
    let client = SseRpcClient::new(config).map_err(|e| e.to_string())?;

    if client.test_connection().await {
        println!("{base_url} is reachable");
        Ok(true)
    } else {
        println!("{base_url} is not reachable");
        Ok(false)
    }
}
