//! Tiered markdown rendering of a compressed knowledge base.
//!
//! Single-file layout, in order:
//!   # Knowledge Base: <topic>
//!   > Compressed by memorypack | N files | X → Y tokens (R:1)
//!   ## Overview, ## Topics (### label + summary), ## Facts (### label + bullets)

use indexmap::IndexMap;
use serde::Serialize;

use crate::core::model::TieredOutput;

/// File name of the single-file layout
pub const SINGLE_FILE: &str = "knowledge_base.md";

pub const OVERVIEW_FILE: &str = "overview.md";
pub const FACTS_FILE: &str = "facts.md";
pub const INDEX_FILE: &str = "index.json";

/// `1234567` -> `"1,234,567"`
pub fn format_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Input over output tokens, 0 when the output is empty
pub fn compression_ratio(input: usize, output: usize) -> f64 {
    if output == 0 {
        0.0
    } else {
        input as f64 / output as f64
    }
}

/// Title and provenance lines shared by both layouts
fn header(output: &TieredOutput) -> [String; 2] {
    let ratio = compression_ratio(output.input_token_count, output.output_token_count);
    [
        format!("# Knowledge Base: {}", output.topic),
        format!(
            "> Compressed by memorypack | {} files | {} → {} tokens ({ratio:.1}:1)",
            output.file_count,
            format_thousands(output.input_token_count),
            format_thousands(output.output_token_count),
        ),
    ]
}

/// Render the single-file document
pub fn render_single(output: &TieredOutput) -> String {
    let mut lines: Vec<String> = header(output).into();
    lines.push(String::new());

    // Tier 1
    lines.push("## Overview".into());
    lines.push(output.overview.clone());
    lines.push(String::new());

    // Tier 2
    lines.push("## Topics".into());
    for g in &output.groups {
        lines.push(format!("### {}", g.label));
        lines.push(g.summary.clone());
        lines.push(String::new());
    }

    // Tier 3, only groups that carry facts
    lines.push("## Facts".into());
    for g in output.groups.iter().filter(|g| !g.facts.is_empty()) {
        lines.push(format!("### {}", g.label));
        lines.extend(g.facts.iter().map(|f| format!("- {f}")));
        lines.push(String::new());
    }

    lines.join("\n")
}

#[derive(Debug, Serialize)]
struct IndexEntry<'a> {
    label: &'a str,
    summary_length: usize,
    fact_count: usize,
}

#[derive(Debug, Serialize)]
struct Index<'a> {
    topic: &'a str,
    file_count: usize,
    input_tokens: usize,
    output_tokens: usize,
    compression_ratio: f64,
    groups: Vec<IndexEntry<'a>>,
}

/// Render the multi-file layout: file name -> content, in write order
pub fn render_multi(output: &TieredOutput) -> serde_json::Result<IndexMap<&'static str, String>> {
    let mut overview: Vec<String> = header(output).into();
    overview.extend([String::new(), "## Overview".into(), output.overview.clone(), String::new()]);
    for g in &output.groups {
        overview.push(format!("### {}", g.label));
        overview.push(g.summary.clone());
        overview.push(String::new());
    }

    let mut facts = vec![format!("# Facts: {}", output.topic), String::new()];
    for g in output.groups.iter().filter(|g| !g.facts.is_empty()) {
        facts.push(format!("## {}", g.label));
        facts.extend(g.facts.iter().map(|f| format!("- {f}")));
        facts.push(String::new());
    }

    let ratio = compression_ratio(output.input_token_count, output.output_token_count);
    let index = Index {
        topic: &output.topic,
        file_count: output.file_count,
        input_tokens: output.input_token_count,
        output_tokens: output.output_token_count,
        compression_ratio: (ratio * 10.0).round() / 10.0,
        groups: output
            .groups
            .iter()
            .map(|g| IndexEntry {
                label: &g.label,
                summary_length: g.summary.chars().count(),
                fact_count: g.facts.len(),
            })
            .collect(),
    };

    let mut files = IndexMap::new();
    files.insert(OVERVIEW_FILE, overview.join("\n"));
    files.insert(FACTS_FILE, facts.join("\n"));
    files.insert(INDEX_FILE, serde_json::to_string_pretty(&index)?);
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Group;

    fn sample() -> TieredOutput {
        let mut a = Group::new(0, "Ownership");
        a.summary = "Values have one owner.".into();
        a.facts = vec!["Rust moves values by default.".into()];
        let mut b = Group::new(1, "Tooling");
        b.summary = "Cargo drives builds.".into();

        TieredOutput {
            topic: "Rust".into(),
            overview: "Rust notes.".into(),
            groups: vec![a, b],
            input_token_count: 12_345,
            output_token_count: 1_000,
            file_count: 3,
        }
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn single_layout_snapshot() {
        insta::assert_snapshot!(render_single(&sample()), @r"
        # Knowledge Base: Rust
        > Compressed by memorypack | 3 files | 12,345 → 1,000 tokens (12.3:1)

        ## Overview
        Rust notes.

        ## Topics
        ### Ownership
        Values have one owner.

        ### Tooling
        Cargo drives builds.

        ## Facts
        ### Ownership
        - Rust moves values by default.
        ");
    }

    #[test]
    fn zero_output_tokens_gives_zero_ratio() {
        let mut out = sample();
        out.output_token_count = 0;
        assert!(render_single(&out).contains("(0.0:1)"));
    }

    #[test]
    fn multi_layout_has_three_files() {
        let files = render_multi(&sample()).unwrap();
        let names: Vec<&str> = files.keys().copied().collect();
        assert_eq!(names, vec![OVERVIEW_FILE, FACTS_FILE, INDEX_FILE]);

        assert!(files[FACTS_FILE].contains("## Ownership\n- Rust moves values by default."));
        assert!(!files[FACTS_FILE].contains("Tooling"));

        let index: serde_json::Value = serde_json::from_str(&files[INDEX_FILE]).unwrap();
        assert_eq!(index["compression_ratio"], 12.3);
        assert_eq!(index["groups"][1]["fact_count"], 0);
    }
}
