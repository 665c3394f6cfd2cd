//! Skill documents: `SKILL.md` files teaching the model how to handle a
//! task, discovered recursively under a skills directory and concatenated
//! into the `## Skills` prompt section in alphabetical (path) order. Ported
//! from `examples/original_source/nexus/skills/loader.py`'s
//! `load_skill_documents`.

use std::path::{Path, PathBuf};

/// A single loaded `SKILL.md` document.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillDocument {
    pub name: String,
    pub path: PathBuf,
    pub content: String,
}

/// Recursively find every `SKILL.md` under `skills_dir`, sorted by path
/// (alphabetical), skipping files that fail to read. `name` is the
/// containing directory's name, matching the original's per-skill layout
/// (`skills/<name>/SKILL.md`).
pub fn load_skill_documents(skills_dir: &Path) -> Vec<SkillDocument> {
    if !skills_dir.is_dir() {
        return Vec::new();
    }
    let mut paths = find_skill_files(skills_dir);
    paths.sort();

    paths
        .into_iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            let content = content.trim();
            if content.is_empty() {
                return None;
            }
            let name = path
                .parent()
                .and_then(|p| p.file_name())
                .and_then(|n| n.to_str())
                .unwrap_or("skill")
                .to_string();
            Some(SkillDocument { name, path, content: content.to_string() })
        })
        .collect()
}

fn find_skill_files(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return out,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            out.extend(find_skill_files(&path));
        } else if path.file_name().and_then(|n| n.to_str()) == Some("SKILL.md") {
            out.push(path);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_dir_yields_no_skills() {
        let dir = tempfile::tempdir().unwrap();
        let skills_dir = dir.path().join("skills");
        assert!(load_skill_documents(&skills_dir).is_empty());
    }

    #[test]
    fn loads_skills_alphabetically_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let skills_dir = dir.path().join("skills");
        std::fs::create_dir_all(skills_dir.join("zebra")).unwrap();
        std::fs::create_dir_all(skills_dir.join("alpha")).unwrap();
        std::fs::write(skills_dir.join("zebra/SKILL.md"), "# Zebra\ndo zebra things").unwrap();
        std::fs::write(skills_dir.join("alpha/SKILL.md"), "# Alpha\ndo alpha things").unwrap();

        let skills = load_skill_documents(&skills_dir);
        assert_eq!(skills.len(), 2);
        assert_eq!(skills[0].name, "alpha");
        assert_eq!(skills[1].name, "zebra");
    }

    #[test]
    fn skips_empty_skill_files() {
        let dir = tempfile::tempdir().unwrap();
        let skills_dir = dir.path().join("skills");
        std::fs::create_dir_all(skills_dir.join("empty")).unwrap();
        std::fs::write(skills_dir.join("empty/SKILL.md"), "   \n").unwrap();
        assert!(load_skill_documents(&skills_dir).is_empty());
    }
}
