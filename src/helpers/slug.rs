use chrono::Utc;

/// Lowercase the input and collapse every run of non-alphanumeric characters
/// into a single hyphen. Inputs with no usable characters fall back to
/// `<prefix>-<millis>` so the result is never empty.
pub fn slugify(input: &str, fallback_prefix: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for ch in input.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        format!("{}-{}", fallback_prefix, Utc::now().timestamp_millis())
    } else {
        slug.to_string()
    }
}

/// Trim a free-form name; blank or missing names resolve to None.
pub fn normalize_name(name: Option<&str>) -> Option<String> {
    let trimmed = name?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
