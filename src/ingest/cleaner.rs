//! Markdown normalisation that keeps headings, lists and paragraphs intact.

use std::sync::LazyLock;

use regex::Regex;

static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank-run regex compiles"));

static SPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {2,}").expect("space-run regex compiles"));

static HTML_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment regex compiles"));

/// `[label]: url "title"` reference definitions
static REF_DEFINITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\[.+?\]:[ \t]+\S+.*$").expect("reference regex compiles")
});

static IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("image regex compiles"));

static HORIZONTAL_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[-*_]{3,}[ \t]*$").expect("rule regex compiles"));

/// Normalise markdown for chunking.
///
/// Steps, in order: collapse 3+ newlines, per-line whitespace cleanup
/// (trailing stripped, interior runs collapsed, indentation kept), drop HTML
/// comments and reference definitions, replace images with their alt text,
/// rewrite horizontal rules as `---`, collapse blank runs again and trim.
pub fn clean_markdown(text: &str) -> String
{
    let text = text.replace("\r\n", "\n");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");

    let text = text
        .split('\n')
        .map(normalize_line)
        .collect::<Vec<_>>()
        .join("\n");

    let text = HTML_COMMENT.replace_all(&text, "");
    let text = REF_DEFINITION.replace_all(&text, "");
    let text = IMAGE.replace_all(&text, "$1");
    let text = HORIZONTAL_RULE.replace_all(&text, "---");
    let text = BLANK_RUNS.replace_all(&text, "\n\n");

    text.trim()
        .to_string()
}

/// Trailing whitespace removed, interior space runs collapsed
fn normalize_line(line: &str) -> String
{
    let line = line.trim_end();
    let body = line.trim_start();
    let indent = &line[..line.len() - body.len()];

    format!("{indent}{}", SPACE_RUNS.replace_all(body, " "))
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn collapses_blank_lines_and_spaces()
    {
        let out = clean_markdown("# Title   \n\n\n\nSome    words  here\n");
        assert_eq!(out, "# Title\n\nSome words here");
    }

    #[test]
    fn keeps_indentation()
    {
        let out = clean_markdown("- item\n    nested  code");
        assert_eq!(out, "- item\n    nested code");
    }

    #[test]
    fn removes_comments_and_reference_definitions()
    {
        let out = clean_markdown("Text <!-- hidden\nmultiline --> after\n\n[ref]: https://example.com \"T\"");
        assert_eq!(out, "Text  after");
    }

    #[test]
    fn images_become_alt_text()
    {
        let out = clean_markdown("See ![diagram of flow](img/flow.png) below");
        assert_eq!(out, "See diagram of flow below");
    }

    #[test]
    fn horizontal_rules_are_normalised()
    {
        let out = clean_markdown("above\n\n*****\n\nbelow\n___  ");
        assert_eq!(out, "above\n\n---\n\nbelow\n---");
    }
}
