//! Reading markdown sources and splitting off YAML-style frontmatter.

use std::path::{Path, PathBuf};

use anyhow::Result;
use indexmap::IndexMap;
use tracing::debug;

use crate::infra::{io::read_text, walk::FileWalker};

/// Frontmatter fence line
const FENCE: &str = "---";

/// A markdown file read from disk
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile
{
    pub path: PathBuf,

    /// File content as read
    pub raw_content: String,

    /// Simple `key: value` frontmatter entries, in file order
    pub metadata: IndexMap<String, String>,

    /// Content after the frontmatter block
    pub body: String,
}

/// Split a leading `---` fenced block from `raw`.
///
/// Without an opening fence on the first line, or without a closing fence,
/// the whole text is the body.
pub fn split_frontmatter(raw: &str) -> (IndexMap<String, String>, &str)
{
    let mut metadata = IndexMap::new();

    let text = raw
        .strip_prefix('\u{feff}')
        .unwrap_or(raw);
    let mut lines = text.split_inclusive('\n');

    let Some(first) = lines.next()
    else
    {
        return (metadata, raw);
    };
    if first.trim_end() != FENCE
    {
        return (metadata, raw);
    }
    let mut offset = first.len();

    for line in lines
    {
        offset += line.len();
        let trimmed = line.trim_end();

        if trimmed == FENCE
        {
            let body = text[offset..].trim_start_matches(['\r', '\n']);
            return (metadata, body);
        }

        // Top-level keys only; indented lines belong to nested values
        if let Some((key, value)) = trimmed.split_once(':')
            && !key.starts_with([' ', '\t'])
        {
            let key = key.trim();
            if !key.is_empty() && !key.starts_with('#')
            {
                let value = value
                    .trim()
                    .trim_matches(|c| c == '"' || c == '\'');
                metadata.insert(key.to_string(), value.to_string());
            }
        }
    }

    // Unterminated block: treat as plain content
    (IndexMap::new(), raw)
}

/// Read one markdown file
pub fn read_file(path: &Path) -> Result<SourceFile>
{
    let raw = read_text(path)?;
    let (metadata, body) = split_frontmatter(&raw);
    let body = body.to_string();

    debug!(path = %path.display(), bytes = raw.len(), frontmatter = metadata.len(), "read source");

    Ok(SourceFile { path: path.to_path_buf(), metadata, body, raw_content: raw })
}

/// Discover and read every markdown file reachable from `inputs`
pub fn read_files<P: AsRef<Path>>(
    inputs: &[P],
    walker: &FileWalker,
) -> Result<Vec<SourceFile>>
{
    walker
        .discover(inputs)?
        .iter()
        .map(|p| read_file(p))
        .collect()
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn strips_frontmatter_and_keeps_order()
    {
        let raw = "---\ntitle: \"Rust Notes\"\ntags: ownership\n---\n\n# Heading\nBody";
        let (meta, body) = split_frontmatter(raw);

        assert_eq!(body, "# Heading\nBody");
        assert_eq!(meta.get_index(0), Some((&"title".to_string(), &"Rust Notes".to_string())));
        assert_eq!(meta["tags"], "ownership");
    }

    #[test]
    fn text_without_fence_is_all_body()
    {
        let raw = "# Title\n---\nnot frontmatter";
        let (meta, body) = split_frontmatter(raw);
        assert!(meta.is_empty());
        assert_eq!(body, raw);
    }

    #[test]
    fn unterminated_block_is_all_body()
    {
        let raw = "---\ntitle: x\nno closing fence";
        let (meta, body) = split_frontmatter(raw);
        assert!(meta.is_empty());
        assert_eq!(body, raw);
    }

    #[test]
    fn crlf_fences_are_recognised()
    {
        let raw = "---\r\nkey: v\r\n---\r\ncontent";
        let (meta, body) = split_frontmatter(raw);
        assert_eq!(meta["key"], "v");
        assert_eq!(body, "content");
    }

    #[test]
    fn reads_file_from_disk()
    {
        let tmp = tempfile::TempDir::new().unwrap();
        let p = tmp.path().join("n.md");
        std::fs::write(&p, "---\na: 1\n---\ntext").unwrap();

        let src = read_file(&p).unwrap();
        assert_eq!(src.body, "text");
        assert_eq!(src.metadata["a"], "1");
        assert!(src.raw_content.starts_with("---"));
    }
}
