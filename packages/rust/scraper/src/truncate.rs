/// Cut `text` to at most `max_chars` characters.
///
/// The cut always lands on a char boundary. When a whitespace character sits
/// in the last tenth of the window the text is cut there instead, so words are
/// not split mid-way. The result never exceeds `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }

    let Some((cut, _)) = text.char_indices().nth(max_chars) else {
        return text;
    };
    let window = &text[..cut];

    let floor_chars = max_chars - max_chars / 10;
    let floor = window
        .char_indices()
        .nth(floor_chars)
        .map_or(window.len(), |(i, _)| i);

    match window[floor..].rfind(char::is_whitespace) {
        Some(pos) => window[..floor + pos].trim_end(),
        None => window,
    }
}
