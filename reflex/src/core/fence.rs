//! Markdown code-fence parsing for model replies.
//!
//! Models are asked for a bare file body but often wrap it in a fenced block.
//! A reply that *starts* with a fence is unwrapped; anything else is returned
//! unchanged.

/// Opening fence of a fenced code block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fence {
    marker: char,
    len: usize,
}

/// Strip a surrounding markdown fence from `text`.
///
/// - Leading/trailing whitespace is ignored when detecting the fence.
/// - Backtick and tilde fences of length >= 3 are recognised, with an optional
///   info string (`` ```python ``).
/// - The closing fence must use the same marker and be at least as long as the
///   opening one. A missing closing fence keeps everything after the opening line.
/// - The unwrapped body is trimmed.
///
/// Input without a leading fence (or with a fence but no body line) is
/// returned unchanged.
pub fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some((first_line, rest)) = trimmed.split_once('\n') else {
        return text.to_string();
    };
    let Some(open) = parse_opening(first_line) else {
        return text.to_string();
    };

    let mut body = Vec::new();
    let mut closed = false;
    for line in rest.lines() {
        if is_closing(line, open) {
            closed = true;
            break;
        }
        body.push(line);
    }
    if !closed && let Some(last) = body.last_mut() {
        *last = strip_glued_close(*last, open);
    }
    body.join("\n").trim().to_string()
}

/// Drop a closing fence written directly after code on the last line.
fn strip_glued_close(line: &str, open: Fence) -> &str {
    let trimmed = line.trim_end();
    let closing = open.marker.to_string().repeat(open.len);
    trimmed.strip_suffix(closing.as_str()).unwrap_or(line)
}

fn parse_opening(line: &str) -> Option<Fence> {
    let line = line.trim_start();
    let marker = line.chars().next()?;
    if marker != '`' && marker != '~' {
        return None;
    }
    let len = line.chars().take_while(|&ch| ch == marker).count();
    if len < 3 {
        return None;
    }
    let info = &line[len * marker.len_utf8()..];
    // A backtick info string may not contain backticks (CommonMark).
    if marker == '`' && info.contains('`') {
        return None;
    }
    Some(Fence { marker, len })
}

fn is_closing(line: &str, open: Fence) -> bool {
    let line = line.trim();
    let len = line.chars().take_while(|&ch| ch == open.marker).count();
    len >= open.len && line.chars().count() == len
}
