//! Cleanup for user-supplied text before it is written or used in a filter.

pub const MAX_COMMENT_CHARS: usize = 5000;
pub const MAX_SEARCH_CHARS: usize = 200;
pub const MAX_INPUT_CHARS: usize = 10_000;
pub const MAX_USERNAME_CHARS: usize = 50;

/// Trims, caps at `max_chars`, then drops NUL and zero-width characters.
pub fn sanitize_input(input: &str, max_chars: usize) -> String {
    input
        .trim()
        .chars()
        .take(max_chars)
        .filter(|c| !is_hidden(*c))
        .collect()
}

pub fn sanitize_comment(content: &str) -> String {
    sanitize_input(content, MAX_COMMENT_CHARS)
}

pub fn sanitize_search_query(query: &str) -> String {
    sanitize_input(query, MAX_SEARCH_CHARS)
}

/// Free text with only the general length cap.
pub fn sanitize_text(input: &str) -> String {
    sanitize_input(input, MAX_INPUT_CHARS)
}

/// ASCII letters, digits, `_` and `-` only.
pub fn sanitize_username(username: &str) -> String {
    sanitize_input(username, MAX_USERNAME_CHARS)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

fn is_hidden(c: char) -> bool {
    matches!(c, '\0' | '\u{200B}'..='\u{200D}' | '\u{FEFF}')
}
