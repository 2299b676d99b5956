//! Heuristic parsing of model output into document sections.
//!
//! The backend is asked for explicit headers, but its output is free text
//! and may not comply. Parsing is therefore best-effort: headers are located
//! case-insensitively on their own lines, and when nothing recognizable is
//! found the full raw text is placed into all three sections so no content
//! is silently dropped. `Sections::raw` always carries the unmodified
//! response.

use qa_analyzer_sdk::events::{Preview, Sections};
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Stories,
    Tests,
    Acceptance,
}

/// A header line: optional markdown heading or numbering prefix, the section
/// name, optional colon — and nothing else on the line. Anchoring to the
/// whole line keeps prose that merely mentions "testing" from opening a
/// section.
fn header_patterns() -> Vec<(SectionKind, Regex)> {
    let prefix = r"^\s*(?:#{1,6}\s*|\d+[.)]\s*)?\**\s*";
    let suffix = r"\s*\**\s*:?\s*$";
    vec![
        (
            SectionKind::Stories,
            Regex::new(&format!(r"(?i){}(?:user\s+stories|stories){}", prefix, suffix)).unwrap(),
        ),
        (
            SectionKind::Tests,
            Regex::new(&format!(
                r"(?i){}(?:test\s+cases?|tests|testing){}",
                prefix, suffix
            ))
            .unwrap(),
        ),
        (
            SectionKind::Acceptance,
            Regex::new(&format!(
                r"(?i){}(?:acceptance(?:\s+criteria)?|criteria){}",
                prefix, suffix
            ))
            .unwrap(),
        ),
    ]
}

/// Split raw model output into sections.
pub fn parse_sections(raw: &str) -> Sections {
    let patterns = header_patterns();

    let mut stories = String::new();
    let mut tests = String::new();
    let mut acceptance = String::new();
    let mut current: Option<SectionKind> = None;
    let mut matched_any = false;

    for line in raw.lines() {
        let header = patterns
            .iter()
            .find(|(_, re)| re.is_match(line))
            .map(|(kind, _)| *kind);

        if let Some(kind) = header {
            matched_any = true;
            current = Some(kind);
            continue;
        }

        let target = match current {
            Some(SectionKind::Stories) => &mut stories,
            Some(SectionKind::Tests) => &mut tests,
            Some(SectionKind::Acceptance) => &mut acceptance,
            None => continue,
        };
        target.push_str(line);
        target.push('\n');
    }

    if !matched_any {
        // Nothing recognizable: hand the full text to every section rather
        // than dropping it.
        return Sections {
            user_stories: raw.to_string(),
            test_cases: raw.to_string(),
            acceptance_criteria: raw.to_string(),
            raw: raw.to_string(),
        };
    }

    Sections {
        user_stories: stories.trim().to_string(),
        test_cases: tests.trim().to_string(),
        acceptance_criteria: acceptance.trim().to_string(),
        raw: raw.to_string(),
    }
}

/// Rough artifact counts for UI feedback. Not authoritative.
pub fn preview_counts(sections: &Sections) -> Preview {
    let story_re = Regex::new(r"(?im)^\s*(?:[-*]\s*|\d+[.)]\s*)?(?:as\s+an?\b|as\s+the\b|scenario\b)")
        .unwrap();
    let item_re = Regex::new(r"(?im)^\s*(?:[-*]|\d+[.)])\s+\S").unwrap();

    Preview {
        stories: story_re.find_iter(&sections.user_stories).count(),
        tests: item_re.find_iter(&sections.test_cases).count(),
    }
}
