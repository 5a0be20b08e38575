/// Normalizes extracted text
///
/// - Whitespace runs inside a line become a single space
/// - Lines are trimmed and empty lines mark paragraph boundaries
/// - Lines of one paragraph are joined with a space
/// - Paragraphs are separated by exactly one blank line
/// - Leading and trailing whitespace is removed
pub fn normalize(text: &str) -> String {
    split_into_paragraphs(text)
        .iter()
        .map(|paragraph| paragraph.join(" "))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Splits text into paragraphs of whitespace-collapsed lines
pub fn split_into_paragraphs(text: &str) -> Vec<Vec<String>> {
    let mut paragraphs = Vec::new();
    let mut current = Vec::new();

    for line in text.lines() {
        let collapsed = collapse_whitespace(line);
        if collapsed.is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
        } else {
            current.push(collapsed);
        }
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs
}

/// Collapses every whitespace run to one space and trims the ends
pub fn collapse_whitespace(segment: &str) -> String {
    segment.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Number of characters (not bytes) in `text`
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
