//! Whitespace and accent normalization

/// Collapses every run of whitespace into a single space and trims the ends
///
/// # Example
///
/// ```
/// use offer_harvester::text::collapse_whitespace;
///
/// assert_eq!(collapse_whitespace("  Chargé \n\t de   projet "), "Chargé de projet");
/// ```
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercases text and strips French diacritics
///
/// Used wherever keyword tables are matched against free text, so that
/// "Lomé", "LOME" and "lome" compare equal.
///
/// # Example
///
/// ```
/// use offer_harvester::text::fold_accents;
///
/// assert_eq!(fold_accents("Télétravail à Lomé"), "teletravail a lome");
/// ```
pub fn fold_accents(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        let folded = match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
            'ç' => 'c',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'ñ' => 'n',
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            'ý' | 'ÿ' => 'y',
            'œ' => {
                out.push('o');
                'e'
            }
            'æ' => {
                out.push('a');
                'e'
            }
            // Typographic apostrophes are common in French listings
            '\u{2019}' | '\u{2018}' => '\'',
            '\u{a0}' => ' ',
            other => other,
        };
        out.push(folded);
    }
    out
}

/// True if `needle` occurs in `haystack` between non-alphanumeric boundaries
///
/// Keeps "sage" from matching "message" and "java" from matching
/// "javascript".
pub fn contains_word(haystack: &str, needle: &str) -> bool {
    count_word(haystack, needle) > 0
}

/// Number of word-bounded occurrences of `needle` in `haystack`
pub fn count_word(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack
        .match_indices(needle)
        .filter(|(start, matched)| {
            let before = haystack[..*start].chars().next_back();
            let after = haystack[start + matched.len()..].chars().next();
            !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
        })
        .count()
}
