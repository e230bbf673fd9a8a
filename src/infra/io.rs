use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use memmap2::Mmap;

const MMAP_THRESHOLD: u64 = 1024 * 1024; // 1 MiB

pub enum FileContent {
    Mapped(Mmap),
    Buffered(String),
}

impl FileContent {
    /// UTF-8 view of the content
    pub fn as_str(&self) -> Result<&str> {
        match self {
            FileContent::Mapped(mmap) => {
                std::str::from_utf8(mmap).context("file is not valid UTF-8")
            }
            FileContent::Buffered(s) => Ok(s.as_str()),
        }
    }
}

pub fn read_file_smart<P: AsRef<Path>>(path: P) -> Result<FileContent> {
    let path = path.as_ref();
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to read metadata for {}", path.display()))?;

    if metadata.len() > MMAP_THRESHOLD {
        // Use memory mapping for large files
        let file =
            File::open(path).with_context(|| format!("Failed to open file {}", path.display()))?;

        // Safety: We're only reading the file, not modifying it
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("Failed to memory-map {}", path.display()))?;

        Ok(FileContent::Mapped(mmap))
    } else {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file {}", path.display()))?;

        Ok(FileContent::Buffered(content))
    }
}

/// Whole file as an owned string, memory-mapped when large
pub fn read_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let content = read_file_smart(path)?;
    let text = content
        .as_str()
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    Ok(text.to_string())
}

/// Expand a leading `~` (as written in config files) to the home directory
pub fn expand_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).as_ref()),
        None => path.to_path_buf(),
    }
}

/// Write through a same-directory temp file, then rename into place
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;

    tmp.persist(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    Ok(())
}
