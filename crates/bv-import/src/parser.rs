//! Parser for OpenRouter markdown exports.
//!
//! An export starts with a `#` title line, then alternates sections headed
//! by `**User - --**` and `**Assistant - --**` markers. Each user prompt is
//! followed by one assistant section per roster model, in a fixed order.

const USER_MARKER: &str = "**User - --**";
const ASSISTANT_MARKER: &str = "**Assistant - --**";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTurn {
    pub user_prompt: String,
    pub responses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawConversation {
    pub title: String,
    pub turns: Vec<RawTurn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    User,
    Assistant,
}

pub fn parse_export(content: &str, fallback_title: &str) -> RawConversation {
    let title = content
        .trim_start()
        .lines()
        .next()
        .map(|line| line.trim_start_matches('#').trim())
        .filter(|line| !line.is_empty())
        .unwrap_or(fallback_title)
        .to_owned();

    let mut turns = Vec::new();
    let mut current: Option<RawTurn> = None;

    for (kind, text) in split_sections(content) {
        if text.is_empty() {
            continue;
        }
        match kind {
            SectionKind::User => {
                if let Some(turn) = current.take() {
                    turns.push(turn);
                }
                current = Some(RawTurn {
                    user_prompt: text.to_owned(),
                    responses: Vec::new(),
                });
            }
            SectionKind::Assistant => {
                // An assistant section before any user prompt is stray
                // preamble and is dropped.
                if let Some(turn) = current.as_mut() {
                    turn.responses.push(text.to_owned());
                }
            }
        }
    }
    if let Some(turn) = current.take() {
        turns.push(turn);
    }

    RawConversation { title, turns }
}

/// Split the export into (kind, trimmed content) pairs, in document order.
/// Everything before the first marker (the title block) is discarded.
fn split_sections(content: &str) -> Vec<(SectionKind, &str)> {
    let mut sections = Vec::new();
    let mut cursor = 0;
    let mut open: Option<(SectionKind, usize)> = None;

    while let Some((pos, kind, marker_len)) = next_marker(content, cursor) {
        if let Some((open_kind, start)) = open.take() {
            sections.push((open_kind, content[start..pos].trim()));
        }
        open = Some((kind, pos + marker_len));
        cursor = pos + marker_len;
    }
    if let Some((open_kind, start)) = open.take() {
        sections.push((open_kind, content[start..].trim()));
    }

    sections
}

fn next_marker(content: &str, from: usize) -> Option<(usize, SectionKind, usize)> {
    let user = content[from..]
        .find(USER_MARKER)
        .map(|i| (from + i, SectionKind::User, USER_MARKER.len()));
    let assistant = content[from..]
        .find(ASSISTANT_MARKER)
        .map(|i| (from + i, SectionKind::Assistant, ASSISTANT_MARKER.len()));

    match (user, assistant) {
        (Some(u), Some(a)) => Some(if u.0 < a.0 { u } else { a }),
        (Some(u), None) => Some(u),
        (None, Some(a)) => Some(a),
        (None, None) => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn export(turn_count: usize, responses_per_turn: usize) -> String {
        let mut out = String::from("# Sample Conversation\n\n");
        for turn in 1..=turn_count {
            out.push_str(&format!("{USER_MARKER}\n\nprompt {turn}\n\n"));
            for response in 1..=responses_per_turn {
                out.push_str(&format!(
                    "{ASSISTANT_MARKER}\n\nanswer {turn}.{response}\n\n"
                ));
            }
        }
        out
    }

    #[test]
    fn test_title_from_heading() {
        let parsed = parse_export(&export(1, 4), "fallback");
        assert_eq!(parsed.title, "Sample Conversation");
    }

    #[test]
    fn test_title_falls_back_to_file_stem() {
        let parsed = parse_export("", "2025-09-12-export");
        assert_eq!(parsed.title, "2025-09-12-export");
        assert!(parsed.turns.is_empty());
    }

    #[test]
    fn test_multi_turn_parse() {
        let parsed = parse_export(&export(3, 4), "fallback");
        assert_eq!(parsed.turns.len(), 3);
        for (index, turn) in parsed.turns.iter().enumerate() {
            assert_eq!(turn.user_prompt, format!("prompt {}", index + 1));
            assert_eq!(turn.responses.len(), 4);
            assert_eq!(turn.responses[0], format!("answer {}.1", index + 1));
        }
    }

    #[test]
    fn test_short_turn_is_preserved_for_validation() {
        // The parser reports what it saw; rejecting short turns is the
        // importer's call.
        let parsed = parse_export(&export(1, 3), "fallback");
        assert_eq!(parsed.turns.len(), 1);
        assert_eq!(parsed.turns[0].responses.len(), 3);
    }

    #[test]
    fn test_assistant_before_any_user_is_dropped() {
        let content = format!("# T\n\n{ASSISTANT_MARKER}\n\nstray\n\n{}", export(1, 2));
        let parsed = parse_export(&content, "fallback");
        assert_eq!(parsed.turns.len(), 1);
        assert_eq!(parsed.turns[0].responses.len(), 2);
    }

    #[test]
    fn test_markdown_inside_sections_survives() {
        let content = format!(
            "# T\n\n{USER_MARKER}\n\nWrite **bold** code\n\n{ASSISTANT_MARKER}\n\n```rust\nfn main() {{}}\n```\n"
        );
        let parsed = parse_export(&content, "fallback");
        assert_eq!(parsed.turns[0].user_prompt, "Write **bold** code");
        assert!(parsed.turns[0].responses[0].contains("fn main()"));
    }
}
