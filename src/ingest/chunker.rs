//! Sentence-aligned chunking to a target token size.

use crate::core::{model::Item, tokens::estimate_tokens};

/// Default target tokens per chunk
pub const DEFAULT_CHUNK_TOKENS: usize = 512;

/// Split a paragraph at `.`, `!` or `?` followed by whitespace
pub fn split_sentences(text: &str) -> Vec<&str>
{
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text
        .char_indices()
        .peekable();

    while let Some((i, c)) = chars.next()
    {
        if !matches!(c, '.' | '!' | '?')
        {
            continue;
        }
        let Some(&(_, next)) = chars.peek()
        else
        {
            break;
        };
        if next.is_whitespace()
        {
            let end = i + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty()
            {
                out.push(sentence);
            }
            start = end;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty()
    {
        out.push(tail);
    }
    out
}

/// Chunk `text` from `origin` into items of about `target_tokens`.
///
/// Paragraphs are separated by blank lines. Heading paragraphs join the
/// content that follows them. A chunk is flushed before a sentence that
/// would push it past the target, so a single long sentence still forms
/// its own chunk. Ids are assigned from `start_id` upward.
pub fn chunk_text(
    text: &str,
    origin: &str,
    target_tokens: usize,
    start_id: usize,
) -> Vec<Item>
{
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0usize;
    let mut next_id = start_id;

    let paragraphs = text
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty());

    for para in paragraphs
    {
        if para.starts_with('#')
        {
            current.push(para);
            current_tokens += estimate_tokens(para);
            continue;
        }

        for sentence in split_sentences(para)
        {
            let sentence_tokens = estimate_tokens(sentence);

            if current_tokens + sentence_tokens > target_tokens && !current.is_empty()
            {
                flush(&mut current, &mut chunks, &mut next_id, origin);
                current_tokens = 0;
            }

            current.push(sentence);
            current_tokens += sentence_tokens;
        }
    }

    if !current.is_empty()
    {
        flush(&mut current, &mut chunks, &mut next_id, origin);
    }

    chunks
}

/// Join the pending sentences into one item
fn flush(
    current: &mut Vec<&str>,
    chunks: &mut Vec<Item>,
    next_id: &mut usize,
    origin: &str,
)
{
    let body = current.join(" ");
    let tokens = estimate_tokens(&body);
    chunks.push(Item::new(*next_id, body, origin, tokens));
    *next_id += 1;
    current.clear();
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn sentences_split_on_terminal_punctuation()
    {
        let s = split_sentences("First one. Second? Third!  Version 1.2 stays whole");
        assert_eq!(s, vec!["First one.", "Second?", "Third!", "Version 1.2 stays whole"]);
    }

    #[test]
    fn heading_stays_with_following_content()
    {
        let items = chunk_text("# Intro\n\nBody sentence here.", "a.md", 512, 0);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "# Intro Body sentence here.");
        assert_eq!(items[0].origin, "a.md");
    }

    #[test]
    fn flushes_before_exceeding_target()
    {
        // each sentence: 3 words -> 4 tokens
        let text = "one two three. four five six. seven eight nine.";
        let items = chunk_text(text, "a.md", 8, 10);
        let texts: Vec<&str> = items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["one two three. four five six.", "seven eight nine."]);
        assert_eq!(items[0].id, 10);
        assert_eq!(items[1].id, 11);
    }

    #[test]
    fn oversized_sentence_forms_its_own_chunk()
    {
        let long = "word ".repeat(50);
        let items = chunk_text(&format!("short. {long}"), "a.md", 10, 0);
        assert_eq!(items.len(), 2);
        assert!(items[1].token_count > 10);
    }

    #[test]
    fn empty_text_yields_nothing()
    {
        assert!(chunk_text("\n\n  \n\n", "a.md", 512, 0).is_empty());
    }
}
