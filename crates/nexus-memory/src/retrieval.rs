//! Term-frequency scoring over `MEMORY.md` sections and recent-daily-note
//! discovery. Ported directly from the reference scoring algorithm; see
//! SPEC_FULL.md §4.5.

use std::path::{Path, PathBuf};

/// Split a markdown document into sections, each starting at a `#` heading
/// line (the first section may have no leading heading).
pub fn split_sections(memory_text: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in memory_text.lines() {
        if line.starts_with('#') && !current.is_empty() {
            sections.push(current.join("\n").trim().to_string());
            current = vec![line];
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        sections.push(current.join("\n").trim().to_string());
    }
    sections.into_iter().filter(|s| !s.is_empty()).collect()
}

/// Count occurrences of every query token (alphanumeric run, length > 2,
/// case-folded) within `section`, case-insensitively.
pub fn score_section(section: &str, query: &str) -> usize {
    let tokens = query_tokens(query);
    if tokens.is_empty() {
        return 0;
    }
    let lower = section.to_lowercase();
    tokens.iter().map(|t| count_occurrences(&lower, t)).sum()
}

fn query_tokens(query: &str) -> Vec<String> {
    let lower = query.to_lowercase();
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in lower.chars().chain(std::iter::once(' ')) {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            current.push(ch);
        } else if !current.is_empty() {
            if current.len() > 2 {
                tokens.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    tokens
}

fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

/// Select up to `limit` sections, ranked by score descending; ties broken
/// by document order (a stable sort by score alone). If no section scores
/// positive, fall back to the first `limit` sections in document order.
pub fn select_relevant_sections(memory_text: &str, query: &str, limit: usize) -> Vec<String> {
    let sections = split_sections(memory_text);
    let mut scored: Vec<(usize, String)> = sections
        .iter()
        .map(|s| (score_section(s, query), s.clone()))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let positive: Vec<String> = scored
        .into_iter()
        .filter(|(score, _)| *score > 0)
        .map(|(_, s)| s)
        .collect();

    if !positive.is_empty() {
        positive.into_iter().take(limit).collect()
    } else {
        sections.into_iter().take(limit).collect()
    }
}

const DAILY_NOTE_LEN: usize = "YYYY-MM-DD.md".len();

fn is_daily_note_name(name: &str) -> bool {
    if name.len() != DAILY_NOTE_LEN || !name.ends_with(".md") {
        return false;
    }
    let bytes = name.as_bytes();
    let digits = |i: usize| bytes[i].is_ascii_digit();
    (0..4).all(digits)
        && bytes[4] == b'-'
        && (5..7).all(digits)
        && bytes[7] == b'-'
        && (8..10).all(digits)
}

/// List the `days` most recent `YYYY-MM-DD.md` files under `memories_dir`,
/// newest first. File names sort lexically == date sort.
pub fn list_recent_daily_note_paths(memories_dir: &Path, days: usize) -> Vec<PathBuf> {
    if days == 0 || !memories_dir.exists() {
        return Vec::new();
    }
    let mut candidates: Vec<PathBuf> = match std::fs::read_dir(memories_dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .map(is_daily_note_name)
                        .unwrap_or(false)
            })
            .collect(),
        Err(_) => return Vec::new(),
    };
    candidates.sort();
    candidates.reverse();
    candidates.truncate(days);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_headings() {
        let text = "intro\n# A\nbody a\n# B\nbody b\n";
        let sections = split_sections(text);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0], "intro");
        assert!(sections[1].starts_with("# A"));
        assert!(sections[2].starts_with("# B"));
    }

    #[test]
    fn scores_by_token_frequency_ignoring_short_tokens() {
        let section = "the dog the dog ran";
        // "the" has length 3, counted; "ran" length 3, counted.
        assert_eq!(score_section(section, "the"), 2);
        assert_eq!(score_section(section, "a an"), 0);
    }

    #[test]
    fn falls_back_to_document_order_when_nothing_scores() {
        let text = "# A\nalpha\n# B\nbeta\n# C\ngamma\n";
        let selected = select_relevant_sections(text, "zzz", 2);
        assert_eq!(selected.len(), 2);
        assert!(selected[0].starts_with("# A"));
    }

    #[test]
    fn ranks_positive_scores_first() {
        let text = "# A\nnothing here\n# B\nmatch match match\n";
        let selected = select_relevant_sections(text, "match", 1);
        assert_eq!(selected.len(), 1);
        assert!(selected[0].starts_with("# B"));
    }

    #[test]
    fn daily_note_name_matching() {
        assert!(is_daily_note_name("2026-07-29.md"));
        assert!(!is_daily_note_name("MEMORY.md"));
        assert!(!is_daily_note_name("2026-7-29.md"));
    }
}
