//! Text transforms: path segment to handler group name, slugs, first words.

/// Derive a handler group name from a path segment: singularize, then uppercase the first letter.
/// e.g. "users" -> "User", "categories" -> "Category", "address" -> "Address"
pub fn handler_group_name(segment: &str) -> String {
    let name = singular(segment);
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Strip one pluralizing suffix: "-ies" becomes "-y", a single trailing "s" is dropped ("-ss" is kept).
pub fn singular(segment: &str) -> String {
    if segment.len() > 3 && segment.ends_with("ies") {
        format!("{}y", &segment[..segment.len() - 3])
    } else if segment.len() > 1 && segment.ends_with('s') && !segment.ends_with("ss") {
        segment[..segment.len() - 1].to_string()
    } else {
        segment.to_string()
    }
}

/// Replace spaces with underscores (`set = true`) or underscores with spaces (`set = false`).
pub fn slug(text: &str, set: bool) -> String {
    if set {
        text.replace(' ', "_")
    } else {
        text.replace('_', " ")
    }
}

/// First whitespace-separated word of a phrase, or "" for blank input.
pub fn first_word(phrase: &str) -> &str {
    phrase.split_whitespace().next().unwrap_or("")
}
