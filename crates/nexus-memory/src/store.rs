use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;

use tokio::fs;

use crate::retrieval::{list_recent_daily_note_paths, select_relevant_sections};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTurn {
    pub role: String,
    pub content: String,
}

/// Session rolling window per chat + long-term notes file + recent daily
/// journals. Pure in-memory for the session window, file-backed for
/// long-term notes. See SPEC_FULL.md §3 (`SessionWindow`) / §4.5.
///
/// The session window is touched only from the orchestrator — no
/// cross-task mutation (SPEC_FULL.md §5) — so a `std::sync::Mutex` around a
/// plain `HashMap<String, VecDeque<_>>` is the correct, simple primitive;
/// no lock is ever held across an `.await`.
pub struct MemoryStore {
    memories_dir: PathBuf,
    session_window_turns: usize,
    session: Mutex<HashMap<String, VecDeque<SessionTurn>>>,
    memory_file: PathBuf,
}

impl MemoryStore {
    pub async fn new(
        memories_dir: impl Into<PathBuf>,
        session_window_turns: usize,
    ) -> std::io::Result<Self> {
        let memories_dir = memories_dir.into();
        fs::create_dir_all(&memories_dir).await?;
        let memory_file = memories_dir.join("MEMORY.md");
        if fs::metadata(&memory_file).await.is_err() {
            fs::write(&memory_file, "# Long-term Memory\n\n").await?;
        }
        Ok(Self {
            memories_dir,
            session_window_turns,
            session: Mutex::new(HashMap::new()),
            memory_file,
        })
    }

    /// Append a turn to the chat's rolling window, evicting the oldest turn
    /// once `session_window_turns` is exceeded (P10).
    pub fn append_turn(&self, chat_id: &str, role: &str, text: &str) {
        let mut session = self.session.lock().unwrap();
        let window = session.entry(chat_id.to_string()).or_default();
        if window.len() >= self.session_window_turns {
            window.pop_front();
        }
        window.push_back(SessionTurn {
            role: role.to_string(),
            content: text.to_string(),
        });
    }

    pub fn session_history(&self, chat_id: &str) -> Vec<SessionTurn> {
        let session = self.session.lock().unwrap();
        session
            .get(chat_id)
            .map(|w| w.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn append_long_term_note(&self, note: &str) -> std::io::Result<()> {
        use tokio::io::AsyncWriteExt;
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(&self.memory_file)
            .await?;
        file.write_all(format!("- {note}\n").as_bytes()).await
    }

    pub async fn raw_memory(&self) -> std::io::Result<String> {
        fs::read_to_string(&self.memory_file).await
    }

    pub async fn relevant_memory(&self, query: &str, limit: usize) -> std::io::Result<Vec<String>> {
        let raw = self.raw_memory().await?;
        Ok(select_relevant_sections(&raw, query, limit))
    }

    /// Most recent `days` daily journals as `(date_stem, contents)` pairs.
    pub async fn recent_daily_notes(&self, days: usize) -> Vec<(String, String)> {
        let mut notes = Vec::new();
        for path in list_recent_daily_note_paths(&self.memories_dir, days) {
            if let Ok(text) = fs::read_to_string(&path).await {
                let stem = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string();
                notes.push((stem, text));
            }
        }
        notes
    }
}
