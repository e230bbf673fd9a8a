//! Rule-based extraction of atomic, self-contained fact sentences.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::{core::model::Group, ingest::chunker::split_sentences};

/// Shortest sentence (in characters) considered a fact
const MIN_FACT_CHARS: usize = 15;

/// Openers of transitional or context-dependent sentences
const VAGUE_STARTS: [&str; 19] = [
    "this is",
    "it is important",
    "note that",
    "please",
    "for example",
    "in other words",
    "basically",
    "this approach",
    "this allows",
    "this process",
    "this produces",
    "this makes",
    "this suggests",
    "these allow",
    "these models",
    "several approaches",
    "the process",
    "the key",
    "in practice",
];

/// Openers that refer back to something outside the sentence
const PRONOUN_STARTS: [&str; 4] = ["it ", "they ", "its ", "their "];

static EMPHASIS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[*_`~]").expect("emphasis regex compiles"));

static LEADING_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s\-\d.)+]+").expect("marker regex compiles"));

/// Whether a sentence reads like a standalone factual statement
pub fn is_factual(sentence: &str) -> bool
{
    let sentence = sentence.trim();
    if sentence
        .chars()
        .count()
        < MIN_FACT_CHARS
    {
        return false;
    }
    if sentence.ends_with('?')
    {
        return false;
    }

    let lower = sentence.to_lowercase();
    if VAGUE_STARTS
        .iter()
        .chain(PRONOUN_STARTS.iter())
        .any(|v| lower.starts_with(*v))
    {
        return false;
    }

    // Longer sentences need a proper noun / technical term or a number
    let words: Vec<&str> = sentence
        .split_whitespace()
        .collect();
    if words.len() > 3
    {
        let has_term = words
            .iter()
            .skip(1)
            .filter_map(|w| w.chars().next())
            .any(|c| c.is_alphabetic() && c.is_uppercase());
        let has_number = sentence
            .chars()
            .any(|c| c.is_ascii_digit());
        if !has_term && !has_number
        {
            return false;
        }
    }
    true
}

/// Strip markdown decoration, capitalise, and close with punctuation
pub fn clean_fact(sentence: &str) -> String
{
    let fact = EMPHASIS.replace_all(sentence, "");
    let fact = LEADING_MARKER.replace(&fact, "");
    let fact = fact
        .trim_start_matches('#')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let mut chars = fact.chars();
    let mut out = match chars.next()
    {
        Some(first) if first.is_lowercase() =>
        {
            let mut s: String = first
                .to_uppercase()
                .collect();
            s.push_str(chars.as_str());
            s
        }
        Some(_) => fact.to_string(),
        None => return String::new(),
    };

    if !out.ends_with(['.', '!', '?'])
    {
        out.push('.');
    }
    out
}

/// Facts for `text`, deduplicated case-insensitively in first-seen order
pub fn extract_facts_from_text(text: &str) -> Vec<String>
{
    let mut facts = Vec::new();
    let mut seen = HashSet::new();

    for sentence in split_sentences(text)
    {
        if !is_factual(sentence)
        {
            continue;
        }
        let fact = clean_fact(sentence);
        if fact
            .chars()
            .count()
            < MIN_FACT_CHARS
        {
            continue;
        }
        if seen.insert(
            fact.to_lowercase()
                .trim()
                .to_string(),
        )
        {
            facts.push(fact);
        }
    }

    facts
}

/// Facts over the space-joined member texts of a group
pub fn extract_facts(group: &Group) -> Vec<String>
{
    let all_text = group
        .items
        .iter()
        .map(|i| i.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    extract_facts_from_text(&all_text)
}
