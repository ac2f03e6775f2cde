//! Extraction input, options and result types
//!
//! These are the caller-facing shapes: what goes into
//! `ProgressiveExtractor::extract` and the report that comes out. They
//! serialize in camelCase since the report is handed to JSON consumers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::defaults;
use crate::progress::PerformanceMetrics;
use crate::protocol::{CodeConnectMapping, DesignVariable};

/// Where a component entry came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComponentSource {
    /// Named by the remote code-connect mapping
    CodeConnect,
    /// Scraped from generated code; best effort
    Inferred,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    pub source: ComponentSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

/// Which path produced a result
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Optimal,
    Balanced,
    Minimal,
    EmergencyFallback,
    PassThrough,
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMethod::Optimal => write!(f, "optimal"),
            ExtractionMethod::Balanced => write!(f, "balanced"),
            ExtractionMethod::Minimal => write!(f, "minimal"),
            ExtractionMethod::EmergencyFallback => write!(f, "emergency_fallback"),
            ExtractionMethod::PassThrough => write!(f, "pass_through"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionMetadata {
    pub extraction_method: ExtractionMethod,
    pub is_complex: bool,
    /// 1 (optimal) ..= 4 (emergency); 0 for pass-through
    pub fallback_level: u8,
    /// RFC 3339 timestamp
    pub extracted_at: String,
}

impl ExtractionMetadata {
    pub fn new(extraction_method: ExtractionMethod, is_complex: bool, fallback_level: u8) -> Self {
        Self {
            extraction_method,
            is_complex,
            fallback_level,
            extracted_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Extracted design data; never absent from a report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub variables: Vec<DesignVariable>,
    #[serde(default)]
    pub code_connect_map: Vec<CodeConnectMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ExtractionMetadata>,
}

impl ExtractionResult {
    /// Empty result for a file; collections empty, no code
    pub fn empty(file_id: impl Into<String>, node_id: Option<String>, url: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            node_id,
            url: url.into(),
            code: None,
            components: Vec::new(),
            variables: Vec::new(),
            code_connect_map: Vec::new(),
            metadata: None,
        }
    }
}

/// What `extract` returns
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionReport {
    pub figma_data: ExtractionResult,
    pub success: bool,
    pub performance: PerformanceMetrics,
    pub efficiency_score: u8,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// Behavior when `max_wait_time` runs out mid-run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutStrategy {
    /// Skip straight to the emergency level
    #[default]
    Graceful,
    /// Return what the current level gathered so far
    Partial,
    /// Fail the extraction with `DeadlineExceeded`
    Fail,
}

/// Per-invocation options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ExtractOptions {
    pub include_code: bool,
    pub timeout_strategy: TimeoutStrategy,
    /// Overall budget in milliseconds; clamped to 5 000..=60 000
    pub max_wait_time: u64,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            include_code: true,
            timeout_strategy: TimeoutStrategy::default(),
            max_wait_time: defaults::DEFAULT_MAX_WAIT_MS,
        }
    }
}

impl ExtractOptions {
    /// The overall budget after clamping
    pub fn budget(&self) -> Duration {
        Duration::from_millis(
            self.max_wait_time
                .clamp(defaults::MIN_MAX_WAIT_MS, defaults::MAX_MAX_WAIT_MS),
        )
    }
}

/// Input to the extractor
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionInput {
    /// Standalone: fetch everything for this link
    Url { url: String, options: ExtractOptions },
    /// Pass-through: data was already extracted upstream
    Prefetched {
        figma_data: ExtractionResult,
        options: ExtractOptions,
    },
}

impl ExtractionInput {
    pub fn url(url: impl Into<String>) -> Self {
        ExtractionInput::Url {
            url: url.into(),
            options: ExtractOptions::default(),
        }
    }

    pub fn options(&self) -> &ExtractOptions {
        match self {
            ExtractionInput::Url { options, .. } => options,
            ExtractionInput::Prefetched { options, .. } => options,
        }
    }

    /// Interpret a caller's JSON arguments: an object with a `fileId`
    /// (or a nested `figmaData` carrying one) is pass-through data; otherwise
    /// a `url` field is required.
    pub fn from_json(value: serde_json::Value) -> Result<Self, String> {
        let options = match value.get("options") {
            Some(raw) => serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?,
            None => ExtractOptions::default(),
        };

        let prefetched = value
            .get("figmaData")
            .filter(|data| data.get("fileId").is_some())
            .or_else(|| value.get("fileId").map(|_| &value));
        if let Some(data) = prefetched {
            let figma_data = serde_json::from_value(data.clone()).map_err(|e| e.to_string())?;
            return Ok(ExtractionInput::Prefetched {
                figma_data,
                options,
            });
        }

        let url = value
            .get("url")
            .and_then(|u| u.as_str())
            .ok_or_else(|| "input needs either a `url` or data with a `fileId`".to_string())?;
        Ok(ExtractionInput::Url {
            url: url.to_string(),
            options,
        })
    }
}
