//! Design URL parsing and the complex-layout heuristic
//!
//! Accepts Figma-style links such as
//! `https://www.figma.com/design/<fileId>/<title>?node-id=12-34`. The host is
//! not checked; only the path shape and the `node-id` query parameter matter.

use regex::Regex;
use reqwest::Url;
use std::sync::OnceLock;

use crate::error::DomainError;

/// Path segments that precede the file id
const FILE_SEGMENTS: &[&str] = &["file", "design", "proto", "board", "make"];

/// Leading node numbers in this range have been slow to extract in practice
const SLOW_NODE_RANGE: std::ops::RangeInclusive<u64> = 500..=999;

/// A parsed design link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignUrl {
    pub url: String,
    pub file_id: String,
    pub node_id: Option<String>,
}

impl DesignUrl {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let invalid = |reason: &str| DomainError::InvalidUrl {
            url: raw.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        let file_id = segments
            .windows(2)
            .find(|pair| FILE_SEGMENTS.contains(&pair[0]))
            .map(|pair| pair[1].to_string())
            .ok_or_else(|| invalid("no /file/ or /design/ segment followed by a file id"))?;

        let node_id = url
            .query_pairs()
            .find(|(key, _)| key == "node-id")
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Ok(Self {
            url: raw.trim().to_string(),
            file_id,
            node_id,
        })
    }

    /// Whether this link's node is likely to be slow to extract
    pub fn is_complex(&self) -> bool {
        self.node_id.as_deref().is_some_and(is_complex_node)
    }
}

fn long_digit_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{4,}").expect("static regex"))
}

/// Complex-layout heuristic on a node id (`12-34` or `12:34` form).
///
/// A node is complex if it contains a run of four or more digits, has three
/// or more separator-delimited segments, or its leading number falls in
/// `SLOW_NODE_RANGE`.
pub fn is_complex_node(node_id: &str) -> bool {
    if long_digit_run().is_match(node_id) {
        return true;
    }

    let segments: Vec<&str> = node_id.split(['-', ':']).collect();
    if segments.len() >= 3 {
        return true;
    }

    segments
        .first()
        .and_then(|lead| lead.parse::<u64>().ok())
        .is_some_and(|lead| SLOW_NODE_RANGE.contains(&lead))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_design_url() {
        let url = DesignUrl::parse("https://x.com/design/ABC123/Foo?node-id=10-20").unwrap();
        assert_eq!(url.file_id, "ABC123");
        assert_eq!(url.node_id.as_deref(), Some("10-20"));
    }

    #[test]
    fn test_parse_file_url_without_node() {
        let url = DesignUrl::parse("https://www.figma.com/file/XyZ789/My-File").unwrap();
        assert_eq!(url.file_id, "XyZ789");
        assert_eq!(url.node_id, None);
        assert!(!url.is_complex());
    }

    #[test]
    fn test_parse_encoded_node_id() {
        let url = DesignUrl::parse("https://www.figma.com/design/F1/T?node-id=1%3A2&t=abc").unwrap();
        assert_eq!(url.node_id.as_deref(), Some("1:2"));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            DesignUrl::parse("not a url"),
            Err(DomainError::InvalidUrl { .. })
        ));
        assert!(DesignUrl::parse("https://www.figma.com/community/plugin/1").is_err());
        assert!(DesignUrl::parse("ftp://figma.com/design/ABC/x").is_err());
    }

    #[test]
    fn test_complexity_heuristic() {
        assert!(is_complex_node("1311-9692"));
        assert!(is_complex_node("1-2-3"));
        assert!(is_complex_node("640-12"));
        assert!(!is_complex_node("12-34"));
        assert!(!is_complex_node("10-20"));
        assert!(!is_complex_node("1:2"));
    }
}
