//! Short topic names for groups.
//!
//! Two-stage heuristic; the result is part of the rendered artifact so the
//! order of the fallbacks matters:
//! 1. first markdown heading (6..=49 chars, uppercase start) in item order
//! 2. leading fragment of the largest item

use std::sync::LazyLock;

use regex::Regex;

use crate::core::model::Item;

/// Heading text runs up to a closing `#`, a period, or the end of the line
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)#+[ \t]+(.+?)(?:[ \t]+#|\.|$)").expect("heading regex compiles")
});

/// Separators that end a fallback label fragment
const SEPARATORS: [&str; 4] = [".", " — ", " - ", ","];

/// Window (in characters) searched for a separator
const SEPARATOR_WINDOW: usize = 60;

/// Words kept when no separator is found
const FALLBACK_WORDS: usize = 5;

/// Label for a non-empty list of items
pub fn label(items: &[Item]) -> String
{
    if let Some(h) = heading_label(items)
    {
        return h;
    }

    // First item with the maximal token count
    let Some(largest) = items
        .iter()
        .reduce(|best, it| if it.token_count > best.token_count { it } else { best })
    else
    {
        return String::new();
    };

    fragment_label(&largest.text)
}

/// First heading-like match that looks like a title
fn heading_label(items: &[Item]) -> Option<String>
{
    for item in items
    {
        for caps in HEADING_RE.captures_iter(&item.text)
        {
            let text = caps[1].trim();
            let len = text
                .chars()
                .count();
            let upper = text
                .chars()
                .next()
                .is_some_and(char::is_uppercase);

            if len > 5 && len < 50 && upper
            {
                return Some(text.to_string());
            }
        }
    }
    None
}

/// Leading sentence fragment, or the first few words
fn fragment_label(text: &str) -> String
{
    let text = text
        .trim_start_matches('#')
        .trim();

    // Byte offset of the end of the separator window
    let window_end = text
        .char_indices()
        .nth(SEPARATOR_WINDOW)
        .map_or(text.len(), |(i, _)| i);
    let window = &text[..window_end];

    let cut = SEPARATORS
        .iter()
        .filter_map(|sep| window.find(sep))
        .min();

    let fragment = match cut
    {
        // Rendered on one `### ` line
        Some(pos) => text[..pos]
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" "),
        None => text
            .split_whitespace()
            .take(FALLBACK_WORDS)
            .collect::<Vec<_>>()
            .join(" "),
    };

    fragment
        .trim()
        .trim_end_matches(['.', ',', ';', ':'])
        .to_string()
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn item(
        id: usize,
        text: &str,
        tokens: usize,
    ) -> Item
    {
        Item::new(id, text, "notes.md", tokens)
    }

    #[test]
    fn first_title_like_heading_wins()
    {
        let items = vec![
            item(0, "plain text without headings", 50),
            item(1, "## tiny\n## Memory Layout\nbody", 5),
            item(2, "# Ownership Rules", 5),
        ];
        assert_eq!(label(&items), "Memory Layout");
    }

    #[test]
    fn heading_stops_at_period_or_closing_hash()
    {
        assert_eq!(label(&[item(0, "# Borrow Checker. More text", 1)]), "Borrow Checker");
        assert_eq!(label(&[item(0, "## Trait Objects ##", 1)]), "Trait Objects");
    }

    #[test]
    fn lowercase_or_short_headings_are_ignored()
    {
        let items = vec![item(0, "# lower case heading\n# Abc\nSome body, more", 3)];
        assert_eq!(label(&items), "lower case heading\n# Abc\nSome body");
    }

    #[test]
    fn fallback_uses_earliest_separator_in_window()
    {
        let items = vec![
            item(0, "short", 1),
            item(1, "Caching layers - overview, with details. End", 9),
        ];
        assert_eq!(label(&items), "Caching layers");
    }

    #[test]
    fn fallback_takes_five_words_without_separator()
    {
        let items = vec![item(0, "alpha beta gamma delta epsilon zeta eta", 4)];
        assert_eq!(label(&items), "alpha beta gamma delta epsilon");
    }

    #[test]
    fn separator_beyond_window_is_not_used()
    {
        let text = format!("{} tail. end", "word ".repeat(14));
        let items = vec![item(0, &text, 4)];
        assert_eq!(label(&items), "word word word word word");
    }

    #[test]
    fn fragment_label_stays_on_one_line()
    {
        let items = vec![item(0, "rust stores\nvalues on the stack, then moves them", 10)];
        assert_eq!(label(&items), "rust stores values on the stack");
    }

    #[test]
    fn largest_tie_keeps_first_item()
    {
        let items = vec![item(0, "first one, here", 7), item(1, "second one, here", 7)];
        assert_eq!(label(&items), "first one");
    }

    #[test]
    fn trailing_punctuation_is_stripped()
    {
        let items = vec![item(0, "one two three four five: six", 2)];
        assert_eq!(label(&items), "one two three four five");
    }
}
