//! Best-effort component inference from generated code
//!
//! Scrapes component names out of generated JSX/TSX with a few regexes. The
//! output is an enrichment only: it may miss components or include false
//! positives, and nothing in the pipeline depends on it being right.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::model::{Component, ComponentSource};

/// Names that look like components but are framework plumbing
const IGNORED: &[&str] = &["React", "Fragment", "Props", "Component", "Children"];

struct Patterns {
    declaration: Regex,
    jsx_tag: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        declaration: Regex::new(
            r"(?m)(?:export\s+)?(?:default\s+)?(?:function|const|class)\s+([A-Z][A-Za-z0-9_]*)",
        )
        .expect("static regex"),
        jsx_tag: Regex::new(r"<([A-Z][A-Za-z0-9_]*)[\s/>]").expect("static regex"),
    })
}

/// Component names declared or used in `code`, in order of first appearance
pub fn infer_components(code: &str) -> Vec<Component> {
    let patterns = patterns();
    let mut seen = HashSet::new();
    let mut found: Vec<(usize, String)> = Vec::new();

    for regex in [&patterns.declaration, &patterns.jsx_tag] {
        for captures in regex.captures_iter(code) {
            let Some(name) = captures.get(1) else {
                continue;
            };
            if IGNORED.contains(&name.as_str()) {
                continue;
            }
            if seen.insert(name.as_str().to_string()) {
                found.push((name.start(), name.as_str().to_string()));
            }
        }
    }

    found.sort_by_key(|(position, _)| *position);
    found
        .into_iter()
        .map(|(_, name)| Component {
            name,
            source: ComponentSource::Inferred,
            node_id: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(code: &str) -> Vec<String> {
        infer_components(code).into_iter().map(|c| c.name).collect()
    }

    #[test]
    fn test_declarations_and_usages() {
        let code = r#"
import React from "react";
import { Button } from "./Button";

export default function ProfileCard({ user }: Props) {
  return (
    <Card padding="md">
      <Avatar src={user.avatar} />
      <Button>Follow</Button>
      <div className="name">{user.name}</div>
    </Card>
  );
}
"#;
        assert_eq!(names(code), vec!["ProfileCard", "Card", "Avatar", "Button"]);
    }

    #[test]
    fn test_const_components_and_fragments() {
        let code = "const Badge = () => <><Icon/><span/></>;\nclass Legacy extends React.Component {}";
        assert_eq!(names(code), vec!["Badge", "Icon", "Legacy"]);
    }

    #[test]
    fn test_no_components() {
        assert!(infer_components("<div><span>plain</span></div>").is_empty());
        assert!(infer_components("").is_empty());
    }

    #[test]
    fn test_source_is_inferred() {
        let components = infer_components("<Hero />");
        assert_eq!(components[0].source, ComponentSource::Inferred);
        assert!(components[0].node_id.is_none());
    }
}
