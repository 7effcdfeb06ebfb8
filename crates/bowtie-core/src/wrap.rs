/// Line break understood by the diagram renderer inside node labels.
pub const LINE_BREAK: &str = "<br>";

/// Default number of words per visual line in diagram nodes.
pub const DEFAULT_WORDS_PER_LINE: usize = 3;

/// Group the words of `text` into lines of at most `words_per_line` words
/// joined by `<br>`. A width of zero is treated as one.
pub fn wrap_text(text: &str, words_per_line: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(words_per_line.max(1))
        .map(|chunk| chunk.join(" "))
        .collect::<Vec<_>>()
        .join(LINE_BREAK)
}
