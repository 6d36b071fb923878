use unicode_normalization::UnicodeNormalization;

pub const DELIMITER: &str = "-";
pub const MAX_LENGTH: usize = 128;

const PUNCTUATION: &[char] = &[
    '\t', ' ', '!', '"', '#', '$', '%', '&', '\'', '(', ')', '*', '-', '/', '<', '=', '>', '?',
    '@', '[', '\\', ']', '^', '_', '`', '{', '|', '}', ',', '.',
];

fn is_separator(c: char) -> bool {
    c.is_whitespace() || PUNCTUATION.contains(&c)
}

/// ASCII-only slug usable in paths and URLs.
pub fn slugify(text: &str) -> String {
    slugify_with(text, DELIMITER, MAX_LENGTH)
}

/// Characters without an ASCII decomposition are dropped, not transliterated.
pub fn slugify_with(text: &str, delimiter: &str, max_length: usize) -> String {
    let words: Vec<String> = text
        .to_lowercase()
        .split(is_separator)
        .map(|word| word.nfkd().filter(char::is_ascii).collect::<String>())
        .filter(|word| !word.is_empty())
        .collect();

    let slug: String = words.join(delimiter).chars().take(max_length).collect();
    match slug.strip_suffix(delimiter) {
        Some(trimmed) if !delimiter.is_empty() => trimmed.to_string(),
        _ => slug,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_title() {
        assert_eq!(slugify("Welcome to Imposter!"), "welcome-to-imposter");
    }

    #[test]
    fn punctuation_runs_collapse() {
        assert_eq!(slugify("  Hello,   world... (again) "), "hello-world-again");
        assert_eq!(slugify("snake_case and kebab-case"), "snake-case-and-kebab-case");
    }

    #[test]
    fn accents_are_decomposed() {
        assert_eq!(slugify("Crème brûlée à la café"), "creme-brulee-a-la-cafe");
    }

    #[test]
    fn non_ascii_is_dropped_not_substituted() {
        assert_eq!(slugify("日本語 title"), "title");
        assert_eq!(slugify("日本語"), "");
    }

    #[test]
    fn deterministic_and_idempotent() {
        let title = "Ünïcode: the Good, the Bad & the Ugly";
        let slug = slugify(title);
        assert_eq!(slug, slugify(title));
        assert_eq!(slugify(&slug), slug);
    }

    #[test]
    fn never_exceeds_max_length() {
        let title = "word ".repeat(100);
        let slug = slugify(&title);
        assert!(slug.len() <= MAX_LENGTH);
        assert!(!slug.ends_with('-'));
        assert_eq!(slugify(&slug), slug);

        assert_eq!(slugify_with("abc def ghi", "_", 5), "abc_d");
    }

    #[test]
    fn unicode_spaces_separate_words() {
        assert_eq!(slugify("no\u{a0}break\u{3000}space\nline"), "no-break-space-line");
    }

    #[test]
    fn truncation_drops_a_dangling_delimiter() {
        assert_eq!(slugify_with("abc def", "-", 4), "abc");
        assert_eq!(slugify_with("abc def", "-", 5), "abc-d");
    }

    #[test]
    fn custom_delimiter() {
        assert_eq!(slugify_with("One Two Three", "+", MAX_LENGTH), "one+two+three");
    }
}
