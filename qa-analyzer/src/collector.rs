//! File-based source collector.
//!
//! Reads an ordered list of paths (files or directories) into [`SourceFile`]s.
//! Directories are walked recursively with entries sorted by name, so the
//! resulting order is deterministic. Non-UTF-8 files are skipped with a
//! warning rather than failing the run.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use qa_analyzer_sdk::request::SourceFile;

pub async fn collect_files(paths: &[PathBuf]) -> Result<Vec<SourceFile>> {
    let mut files = Vec::new();
    for path in paths {
        collect_path(path, &mut files).await?;
    }
    Ok(files)
}

async fn collect_path(path: &Path, into: &mut Vec<SourceFile>) -> Result<()> {
    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;

    if metadata.is_dir() {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(path)
            .await
            .with_context(|| format!("cannot list {}", path.display()))?;
        while let Some(entry) = dir.next_entry().await? {
            entries.push(entry.path());
        }
        entries.sort();
        for entry in entries {
            // Box the recursion so the future stays sized.
            Box::pin(collect_path(&entry, into)).await?;
        }
        return Ok(());
    }

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    match String::from_utf8(bytes) {
        Ok(content) => into.push(SourceFile::new(path.display().to_string(), content)),
        Err(_) => tracing::warn!(path = %path.display(), "skipping non-UTF-8 file"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_files_in_argument_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.rs");
        let b = dir.path().join("b.rs");
        std::fs::write(&a, "fn a() {}").unwrap();
        std::fs::write(&b, "fn b() {}").unwrap();

        let files = collect_files(&[b.clone(), a.clone()]).await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].path.ends_with("b.rs"));
        assert!(files[1].path.ends_with("a.rs"));
    }

    #[tokio::test]
    async fn walks_directories_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("z.rs"), "z").unwrap();
        std::fs::write(dir.path().join("sub/inner.rs"), "inner").unwrap();

        let files = collect_files(&[dir.path().to_path_buf()]).await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].path.ends_with("inner.rs"));
        assert!(files[1].path.ends_with("z.rs"));
    }

    #[tokio::test]
    async fn non_utf8_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("blob.bin");
        std::fs::write(&bin, [0u8, 159, 146, 150]).unwrap();
        std::fs::write(dir.path().join("ok.rs"), "fn main() {}").unwrap();

        let files = collect_files(&[dir.path().to_path_buf()]).await.unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].path.ends_with("ok.rs"));
    }

    #[tokio::test]
    async fn missing_path_is_an_error() {
        let err = collect_files(&[PathBuf::from("/no/such/file.rs")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/no/such/file.rs"));
    }
}
