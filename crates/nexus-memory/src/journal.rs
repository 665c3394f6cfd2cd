use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;

/// Append-only daily journal: one `YYYY-MM-DD.md` file per day under the
/// memories directory, each line timestamped. See SPEC_FULL.md §4.5.
pub struct JournalStore {
    memories_dir: PathBuf,
}

impl JournalStore {
    pub async fn new(memories_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let memories_dir = memories_dir.into();
        fs::create_dir_all(&memories_dir).await?;
        Ok(Self { memories_dir })
    }

    /// Append `line` to today's journal file, creating it with a heading if
    /// it doesn't yet exist. Returns the path written to.
    pub async fn append_event(&self, line: &str) -> std::io::Result<PathBuf> {
        let day = Utc::now().format("%Y-%m-%d").to_string();
        let target = self.memories_dir.join(format!("{day}.md"));
        if fs::metadata(&target).await.is_err() {
            fs::write(&target, format!("# Journal {day}\n\n")).await?;
        }
        let entry = format!("- {} {line}\n", Utc::now().to_rfc3339());
        append_to_file(&target, &entry).await?;
        Ok(target)
    }
}

async fn append_to_file(path: &Path, content: &str) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;
    let mut file = fs::OpenOptions::new().append(true).open(path).await?;
    file.write_all(content.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_to_todays_file() {
        let dir = tempfile::tempdir().unwrap();
        let journal = JournalStore::new(dir.path()).await.unwrap();
        let path = journal.append_event("first event").await.unwrap();
        journal.append_event("second event").await.unwrap();
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(contents.contains("first event"));
        assert!(contents.contains("second event"));
        assert!(contents.starts_with("# Journal"));
    }
}
