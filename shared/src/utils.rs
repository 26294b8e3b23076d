use uuid::Uuid;

pub fn generate_document_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn generate_request_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Truncates `content` to at most `max_bytes`, backing off to the previous
/// char boundary so multi-byte characters are never split.
///
/// Used to keep remote error bodies bounded before they end up in logs and
/// error messages.
pub fn truncate_for_log(content: &str, max_bytes: usize) -> &str {
    if content.len() <= max_bytes {
        return content;
    }

    let mut end = max_bytes;
    while end > 0 && !content.is_char_boundary(end) {
        end -= 1;
    }

    &content[..end]
}
