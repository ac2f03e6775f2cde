//! Plain-text rendering of an extraction report

use designlink_core::ExtractionReport;
use std::fmt::Write;

/// Lines of generated code shown before truncating
const CODE_PREVIEW_LINES: usize = 20;

pub fn report_text(report: &ExtractionReport) -> String {
    let data = &report.figma_data;
    let mut out = String::new();

    let _ = writeln!(out, "File:       {}", data.file_id);
    if let Some(node_id) = &data.node_id {
        let _ = writeln!(out, "Node:       {node_id}");
    }
    if let Some(metadata) = &data.metadata {
        let _ = writeln!(
            out,
            "Method:     {} (level {}{})",
            metadata.extraction_method,
            metadata.fallback_level,
            if metadata.is_complex { ", complex" } else { "" }
        );
    }
    let _ = writeln!(
        out,
        "Duration:   {}ms, efficiency {}/100",
        report.performance.total_duration, report.efficiency_score
    );

    let _ = writeln!(out, "\nVariables ({}):", data.variables.len());
    for variable in &data.variables {
        let _ = writeln!(out, "  {} = {}", variable.name, variable.value);
    }

    let _ = writeln!(out, "\nComponents ({}):", data.components.len());
    for component in &data.components {
        let _ = writeln!(out, "  {} [{:?}]", component.name, component.source);
    }

    if let Some(code) = &data.code {
        let total = code.lines().count();
        let _ = writeln!(out, "\nCode ({total} lines):");
        for line in code.lines().take(CODE_PREVIEW_LINES) {
            let _ = writeln!(out, "  {line}");
        }
        if total > CODE_PREVIEW_LINES {
            let _ = writeln!(out, "  ... {} more lines", total - CODE_PREVIEW_LINES);
        }
    }

    for warning in &report.warnings {
        let _ = writeln!(out, "\nwarning: {warning}");
    }
    for error in &report.errors {
        let _ = writeln!(out, "\nerror: {error}");
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use designlink_core::{
        ExtractionMetadata, ExtractionMethod, ExtractionResult, PerformanceMetrics,
    };

    #[test]
    fn test_emergency_report_text() {
        let mut data = ExtractionResult::empty("ABC123", Some("10-20".to_string()), "u");
        data.metadata = Some(ExtractionMetadata::new(
            ExtractionMethod::EmergencyFallback,
            false,
            4,
        ));
        let report = ExtractionReport {
            figma_data: data,
            success: true,
            performance: PerformanceMetrics::default(),
            efficiency_score: 100,
            warnings: vec!["variable extraction timed out after 5000ms".to_string()],
            errors: Vec::new(),
        };

        let text = report_text(&report);
        assert!(text.contains("File:       ABC123"));
        assert!(text.contains("emergency_fallback (level 4)"));
        assert!(text.contains("Variables (0):"));
        assert!(!text.contains("Code ("));
        assert!(text.ends_with("warning: variable extraction timed out after 5000ms"));
    }

    #[test]
    fn test_long_code_truncated() {
        let mut data = ExtractionResult::empty("F", None, "u");
        data.code = Some((0..30).map(|i| format!("line {i}\n")).collect());
        let report = ExtractionReport {
            figma_data: data,
            success: true,
            performance: PerformanceMetrics::default(),
            efficiency_score: 100,
            warnings: Vec::new(),
            errors: Vec::new(),
        };

        let text = report_text(&report);
        assert!(text.contains("Code (30 lines):"));
        assert!(text.contains("line 19"));
        assert!(!text.contains("line 20"));
        assert!(text.contains("... 10 more lines"));
    }
}
