/// Returned by [`get_hook`] when every line of the text is blank.
pub const NO_HOOK: &str = "no hook found";

pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Number of `\n`-separated segments; an empty string is one empty segment.
pub fn count_lines(text: &str) -> usize {
    text.split('\n').count()
}

/// First line that is not blank, scanning top to bottom.
pub fn get_hook(text: &str) -> &str {
    text.split('\n')
        .find(|line| !line.trim().is_empty())
        .unwrap_or(NO_HOOK)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMetrics {
    pub word_count: usize,
    pub line_count: usize,
    pub hook: String,
    pub hook_word_count: usize,
}

impl ContentMetrics {
    pub fn of(text: &str) -> Self {
        let hook = get_hook(text);
        ContentMetrics {
            word_count: count_words(text),
            line_count: count_lines(text),
            hook_word_count: count_words(hook),
            hook: hook.to_string(),
        }
    }
}
