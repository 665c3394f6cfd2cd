//! WhatsApp-safe text formatting: strips zero-width characters, turns
//! markdown headings/bold into WhatsApp's single-asterisk bold, normalizes
//! bullet markers, inlines markdown links, collapses blank-line runs, and
//! passes code fences through untouched.
//!
//! Ported verbatim from
//! `examples/original_source/nexus/core/text_format.py`'s
//! `format_whatsapp_text`.

use regex::Regex;
use std::sync::LazyLock;

const ZERO_WIDTH_CHARS: [char; 5] = ['\u{200b}', '\u{200c}', '\u{200d}', '\u{2060}', '\u{feff}'];

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s{0,3}#{1,6}\s+(.+?)\s*#*\s*$").unwrap());
static HRULE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(?:-{3,}|\*{3,}|_{3,})\s*$").unwrap());
static MARKDOWN_LIST_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*[-+*]\s+(.*)$").unwrap());
static UNICODE_LIST_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*[•●◦○▪▫‣⁃∙]+\s*(.*)$").unwrap());
static STRONG_STARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^*])\*\*([^*\n]+)\*\*($|[^*])").unwrap());
static STRONG_UNDERSCORE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"__([^_\n]+)__").unwrap());
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]\n]+)\]\(([^)\s]+)\)").unwrap());

fn remove_zero_width(text: &str) -> String {
    text.chars().filter(|c| !ZERO_WIDTH_CHARS.contains(c)).collect()
}

fn normalize_list_line(line: &str) -> String {
    if let Some(caps) = MARKDOWN_LIST_RE.captures(line) {
        let item = caps[1].trim();
        return if item.is_empty() { "-".to_string() } else { format!("- {item}") };
    }
    if let Some(caps) = UNICODE_LIST_RE.captures(line) {
        let item = caps[1].trim();
        return if item.is_empty() { "-".to_string() } else { format!("- {item}") };
    }
    line.to_string()
}

fn normalize_inline(line: &str) -> String {
    let line = LINK_RE.replace_all(line, "$1 ($2)");
    let line = STRONG_STARS_RE.replace_all(&line, "$1*$2*$3");
    let line = STRONG_UNDERSCORE_RE.replace_all(&line, "*$1*");
    line.into_owned()
}

fn collapse_blank_lines(lines: Vec<String>) -> Vec<String> {
    let mut collapsed: Vec<String> = Vec::new();
    let mut previous_blank = false;
    for line in lines {
        if line.trim().is_empty() {
            if previous_blank {
                continue;
            }
            collapsed.push(String::new());
            previous_blank = true;
            continue;
        }
        collapsed.push(line.trim_end().to_string());
        previous_blank = false;
    }
    while collapsed.first().is_some_and(|l| l.trim().is_empty()) {
        collapsed.remove(0);
    }
    while collapsed.last().is_some_and(|l| l.trim().is_empty()) {
        collapsed.pop();
    }
    collapsed
}

pub fn format_whatsapp_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut in_code_block = false;
    let mut out_lines: Vec<String> = Vec::new();

    for raw_line in normalized.split('\n') {
        let line = raw_line.trim_end();
        let fence = line.trim().starts_with("```");
        if fence {
            in_code_block = !in_code_block;
            out_lines.push(line.to_string());
            continue;
        }

        if in_code_block {
            out_lines.push(line.to_string());
            continue;
        }

        let line = remove_zero_width(line);
        if let Some(caps) = HEADING_RE.captures(&line) {
            let heading = caps[1].trim();
            out_lines.push(if heading.is_empty() { String::new() } else { format!("*{heading}*") });
            continue;
        }

        if HRULE_RE.is_match(&line) {
            out_lines.push(String::new());
            continue;
        }

        let line = normalize_list_line(&line);
        let line = normalize_inline(&line).trim().to_string();
        out_lines.push(line);
    }

    collapse_blank_lines(out_lines).join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_stays_empty() {
        assert_eq!(format_whatsapp_text(""), "");
    }

    #[test]
    fn headings_become_bold() {
        assert_eq!(format_whatsapp_text("## Plan"), "*Plan*");
    }

    #[test]
    fn bold_stars_collapse_to_single_star() {
        assert_eq!(format_whatsapp_text("this is **important** text"), "this is *important* text");
    }

    #[test]
    fn markdown_bullets_normalize() {
        assert_eq!(format_whatsapp_text("* first\n- second\n+ third"), "- first\n- second\n- third");
    }

    #[test]
    fn links_are_inlined() {
        assert_eq!(format_whatsapp_text("see [docs](https://example.com)"), "see docs (https://example.com)");
    }

    #[test]
    fn code_fences_pass_through_untouched() {
        let input = "```\n## not a heading\n```";
        assert_eq!(format_whatsapp_text(input), input);
    }

    #[test]
    fn blank_line_runs_collapse_to_one() {
        assert_eq!(format_whatsapp_text("a\n\n\n\nb"), "a\n\nb");
    }

    #[test]
    fn zero_width_characters_are_stripped() {
        let input = "hi\u{200b}there";
        assert_eq!(format_whatsapp_text(input), "hithere");
    }
}
