//! Gitignore-aware discovery of markdown sources.
//! - Respects .gitignore, .git/info/exclude, and global gitignore
//! - Extra ignore globs (early directory prune + late file filter)
//! - Only `.md` files are returned
//! - Deterministic ordering for stable output and tests
//!
//! Backed by ripgrep's `ignore` crate and `globset`.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::{DirEntry, WalkBuilder};
use tracing::debug;

/// Markdown extension, compared case-insensitively
const MARKDOWN_EXT: &str = "md";

/// Walker over markdown files with optional extra ignore globs
pub struct FileWalker
{
    /// Compiled set of additional ignore patterns
    ignore_patterns: GlobSet,

    /// Include hidden (dot) files and directories; default false
    include_hidden: bool,
}

impl FileWalker
{
    /// Build a walker with additional ignore patterns (e.g., "drafts/**",
    /// "**/CHANGELOG.md"). Patterns match on paths relative to the root.
    pub fn new(additional_ignores: &[String]) -> Result<Self>
    {
        let mut builder = GlobSetBuilder::new();

        for pattern in additional_ignores
        {
            builder.add(Glob::new(pattern)?);
        }

        Ok(Self { ignore_patterns: builder.build()?, include_hidden: false })
    }

    /// (Optional) Include or exclude hidden files (dotfiles).
    pub fn with_include_hidden(
        mut self,
        include_hidden: bool,
    ) -> Self
    {
        self.include_hidden = include_hidden;
        self
    }

    fn build_walk(
        &self,
        root: &Path,
    ) -> WalkBuilder
    {
        let mut b = WalkBuilder::new(root);

        // WalkBuilder::hidden(true) skips dotfiles
        b.hidden(!self.include_hidden);

        b.git_ignore(true);
        b.git_global(true);
        b.git_exclude(true);
        b.follow_links(false);

        // Early directory pruning on paths relative to the root
        let extra = self
            .ignore_patterns
            .clone();
        let base = root.to_path_buf();
        b.filter_entry(move |ent: &DirEntry| {
            let is_dir = ent
                .file_type()
                .is_some_and(|ft| ft.is_dir());
            if !is_dir
            {
                return true;
            }
            let rel = ent
                .path()
                .strip_prefix(&base)
                .unwrap_or(ent.path());
            !extra.is_match(rel)
        });

        b
    }

    /// Markdown files under `root`, sorted
    pub fn walk_markdown<P: AsRef<Path>>(
        &self,
        root: P,
    ) -> Vec<PathBuf>
    {
        let root_path = root.as_ref();
        let walker = self
            .build_walk(root_path)
            .build();

        let mut out: Vec<PathBuf> = walker
            // Unreadable entries are skipped
            .filter_map(|res| res.ok())
            .filter(|entry| {
                entry
                    .file_type()
                    .is_some_and(|ft| ft.is_file())
            })
            .map(|entry| entry.into_path())
            .filter(|p| is_markdown(p))
            .filter(|abs| {
                let rel = abs
                    .strip_prefix(root_path)
                    .unwrap_or(abs);
                !self
                    .ignore_patterns
                    .is_match(rel)
            })
            .collect();

        out.sort();

        out
    }

    /// Resolve input paths into markdown files.
    ///
    /// Files must carry the `.md` extension; directories are walked
    /// recursively. Order follows the inputs, each directory sorted.
    pub fn discover<P: AsRef<Path>>(
        &self,
        inputs: &[P],
    ) -> Result<Vec<PathBuf>>
    {
        let mut files = Vec::new();

        for input in inputs
        {
            let path = input.as_ref();
            if path.is_file()
            {
                if is_markdown(path)
                {
                    files.push(path.to_path_buf());
                }
                else
                {
                    debug!(path = %path.display(), "skipping non-markdown input");
                }
            }
            else if path.is_dir()
            {
                files.extend(self.walk_markdown(path));
            }
            else
            {
                bail!("Input path does not exist: {}", path.display());
            }
        }

        // Same file reachable through two inputs is read once
        let mut seen = std::collections::HashSet::new();
        files.retain(|p| seen.insert(p.clone()));

        Ok(files)
    }
}

/// True for paths ending in `.md`
pub fn is_markdown(path: &Path) -> bool
{
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(MARKDOWN_EXT))
}

#[cfg(test)]
mod tests
{
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    /// Create a file with parent dirs as needed
    fn write_file(
        root: &Path,
        rel: &str,
        contents: &str,
    ) -> Result<()>
    {
        let path = root.join(rel);
        if let Some(parent) = path.parent()
        {
            std::fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    fn relative(
        root: &Path,
        files: Vec<PathBuf>,
    ) -> Vec<PathBuf>
    {
        files
            .into_iter()
            .map(|p| {
                p.strip_prefix(root)
                    .unwrap()
                    .to_path_buf()
            })
            .collect()
    }

    #[test]
    fn walks_only_markdown_sorted() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp.path();

        write_file(root, "b.md", "# B")?;
        write_file(root, "notes/a.md", "# A")?;
        write_file(root, "notes/script.py", "print()")?;
        write_file(root, "README.MD", "# Readme")?;

        let files = relative(root, FileWalker::new(&[])?.walk_markdown(root));
        assert_eq!(
            files,
            vec![PathBuf::from("README.MD"), PathBuf::from("b.md"), PathBuf::from("notes/a.md")]
        );
        Ok(())
    }

    #[test]
    fn extra_globs_prune_directories_and_files() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp.path();

        write_file(root, "drafts/wip.md", "x")?;
        write_file(root, "keep.md", "x")?;
        write_file(root, "CHANGELOG.md", "x")?;

        let ignores = vec!["drafts/**".to_string(), "CHANGELOG.md".to_string()];
        let files = relative(root, FileWalker::new(&ignores)?.walk_markdown(root));
        assert_eq!(files, vec![PathBuf::from("keep.md")]);
        Ok(())
    }

    #[test]
    fn hidden_files_skipped_by_default() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp.path();

        write_file(root, ".obsidian/cache.md", "x")?;
        write_file(root, "visible.md", "x")?;

        let files = relative(root, FileWalker::new(&[])?.walk_markdown(root));
        assert_eq!(files, vec![PathBuf::from("visible.md")]);

        let files = relative(
            root,
            FileWalker::new(&[])?
                .with_include_hidden(true)
                .walk_markdown(root),
        );
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn discover_mixes_files_and_directories() -> Result<()>
    {
        let tmp = TempDir::new()?;
        let root = tmp.path();

        write_file(root, "one.md", "x")?;
        write_file(root, "dir/two.md", "x")?;
        write_file(root, "skip.txt", "x")?;

        let walker = FileWalker::new(&[])?;
        let files = walker.discover(&[root.join("one.md"), root.join("skip.txt"), root.join("dir")])?;
        assert_eq!(files, vec![root.join("one.md"), root.join("dir/two.md")]);

        assert!(
            walker
                .discover(&[root.join("missing")])
                .is_err()
        );
        Ok(())
    }
}
