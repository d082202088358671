use super::TranscriptFragment;

/// Word budget of a single paragraph
pub const MAX_PARAGRAPH_WORDS: usize = 1000;

/// Group caption fragments into paragraphs.
///
/// A new paragraph starts when the next fragment would push the running word
/// count above [`MAX_PARAGRAPH_WORDS`], or when the running paragraph already
/// ends with a period. There is no look-ahead: a fragment ending in a period
/// only affects where the following fragment goes.
pub fn reconstruct(fragments: &[TranscriptFragment]) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut current_words = 0usize;

    for fragment in fragments {
        let text = fragment.text.as_str();
        let words = text.split_whitespace().count();

        if current_words + words > MAX_PARAGRAPH_WORDS || current.ends_with('.') {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
            current.push_str(text);
            current_words = words;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(text);
            current_words += words;
        }
    }

    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs
}

/// Join paragraphs into the stored subtitle form
pub fn join_paragraphs(paragraphs: &[String]) -> String {
    paragraphs.join("\n")
}
