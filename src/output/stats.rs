//! Compression statistics table.

use tabled::{Table, Tabled, settings::Style};

use crate::{
    core::model::PipelineResult,
    output::render::{compression_ratio, format_thousands},
};

#[derive(Debug, Tabled)]
struct StatRow
{
    #[tabled(rename = "Metric")]
    metric: &'static str,

    #[tabled(rename = "Value")]
    value: String,
}

fn row(
    metric: &'static str,
    value: impl ToString,
) -> StatRow
{
    StatRow { metric, value: value.to_string() }
}

/// Render run statistics; `precise_tokens` adds a `(method, count)` output row
pub fn stats_table(
    result: &PipelineResult,
    precise_tokens: Option<(&str, usize)>,
) -> String
{
    let out = &result.output;
    let ratio = compression_ratio(out.input_token_count, out.output_token_count);

    let mut rows = vec![
        row("Input files", out.file_count),
        row("Input tokens", format_thousands(out.input_token_count)),
        row("Output tokens", format_thousands(out.output_token_count)),
    ];
    if let Some((method, count)) = precise_tokens
    {
        rows.push(StatRow {
            metric: "Output tokens (precise)",
            value: format!("{} ({method})", format_thousands(count)),
        });
    }
    rows.extend([
        row("Compression ratio", format!("{ratio:.1}:1")),
        row("Total items", result.total_items),
        row("Unique items", result.unique_items),
        row("Duplicates removed", result.duplicate_items),
        row("Groups", result.group_count),
        row(
            "Topics",
            out.groups
                .iter()
                .map(|g| g.label.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        ),
        row("K selection", result.k_selection),
    ]);

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::core::model::{Group, KSelection, TieredOutput};

    fn result() -> PipelineResult
    {
        PipelineResult {
            output: TieredOutput {
                topic: "Rust".into(),
                groups: vec![Group::new(0, "Ownership"), Group::new(1, "Cargo")],
                input_token_count: 20_000,
                output_token_count: 2_500,
                file_count: 4,
                ..Default::default()
            },
            total_items: 40,
            unique_items: 35,
            duplicate_items: 5,
            group_count: 2,
            k_selection: KSelection::Scored { k: 2, silhouette: 0.41 },
        }
    }

    #[test]
    fn table_lists_every_metric()
    {
        let table = stats_table(&result(), None);
        for needle in [
            "Input files",
            "20,000",
            "2,500",
            "8.0:1",
            "Duplicates removed",
            "Ownership, Cargo",
            "k=2 (silhouette 0.410)",
        ]
        {
            assert!(table.contains(needle), "missing {needle}:\n{table}");
        }
        assert!(!table.contains("precise"));
    }

    #[test]
    fn precise_row_is_optional()
    {
        let table = stats_table(&result(), Some(("gpt-4o", 2_345)));
        assert!(table.contains("2,345 (gpt-4o)"));
    }
}
