pub const MAX_DESCRIPTION_CHARS: usize = 1000;

/// Strips markup and caps the length of an AniList description.
/// Empty results become `None`.
pub fn clean_description(input: Option<&str>) -> Option<String> {
    let stripped = strip_tags(input?);
    let capped: String = stripped.chars().take(MAX_DESCRIPTION_CHARS).collect();
    if capped.is_empty() {
        None
    } else {
        Some(capped)
    }
}

/// Removes every complete `<...>` tag. A `<` with no closing `>` is kept as text.
pub fn strip_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(open) = rest.find('<') {
        let Some(close) = rest[open..].find('>') else {
            break;
        };
        out.push_str(&rest[..open]);
        rest = &rest[open + close + 1..];
    }
    out.push_str(rest);
    out
}
