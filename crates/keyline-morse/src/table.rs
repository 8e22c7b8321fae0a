//! The international Morse code table.
//!
//! One fixed table, both directions. Lookup is case-insensitive on the
//! character side; patterns are strings of `.` and `-`.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Character ↔ pattern pairs for International Morse.
const CODE_TABLE: &[(char, &str)] = &[
    ('A', ".-"),
    ('B', "-..."),
    ('C', "-.-."),
    ('D', "-.."),
    ('E', "."),
    ('F', "..-."),
    ('G', "--."),
    ('H', "...."),
    ('I', ".."),
    ('J', ".---"),
    ('K', "-.-"),
    ('L', ".-.."),
    ('M', "--"),
    ('N', "-."),
    ('O', "---"),
    ('P', ".--."),
    ('Q', "--.-"),
    ('R', ".-."),
    ('S', "..."),
    ('T', "-"),
    ('U', "..-"),
    ('V', "...-"),
    ('W', ".--"),
    ('X', "-..-"),
    ('Y', "-.--"),
    ('Z', "--.."),
    ('0', "-----"),
    ('1', ".----"),
    ('2', "..---"),
    ('3', "...--"),
    ('4', "....-"),
    ('5', "....."),
    ('6', "-...."),
    ('7', "--..."),
    ('8', "---.."),
    ('9', "----."),
    ('.', ".-.-.-"),
    (',', "--..--"),
    ('?', "..--.."),
    ('\'', ".----."),
    ('!', "-.-.--"),
    ('/', "-..-."),
    ('(', "-.--."),
    (')', "-.--.-"),
    ('&', ".-..."),
    (':', "---..."),
    (';', "-.-.-."),
    ('=', "-...-"),
    ('+', ".-.-."),
    ('-', "-....-"),
    ('_', "..--.-"),
    ('"', ".-..-."),
    ('$', "...-..-"),
    ('@', ".--.-."),
];

fn by_char() -> &'static HashMap<char, &'static str> {
    static MAP: OnceLock<HashMap<char, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| CODE_TABLE.iter().copied().collect())
}

fn by_pattern() -> &'static HashMap<&'static str, char> {
    static MAP: OnceLock<HashMap<&'static str, char>> = OnceLock::new();
    MAP.get_or_init(|| CODE_TABLE.iter().map(|&(c, p)| (p, c)).collect())
}

/// Returns the dot/dash pattern for a character, if it has one.
/// Letters match case-insensitively.
pub fn pattern_for(ch: char) -> Option<&'static str> {
    let upper = ch.to_ascii_uppercase();
    by_char().get(&upper).copied()
}

/// Returns the character for a dot/dash pattern, if the table maps it.
pub fn char_for(pattern: &str) -> Option<char> {
    by_pattern().get(pattern).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letters_map_both_directions() {
        assert_eq!(pattern_for('S'), Some("..."));
        assert_eq!(pattern_for('O'), Some("---"));
        assert_eq!(char_for("..."), Some('S'));
        assert_eq!(char_for("---"), Some('O'));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(pattern_for('q'), pattern_for('Q'));
    }

    #[test]
    fn test_unmapped_inputs_return_none() {
        assert_eq!(pattern_for('#'), None);
        assert_eq!(char_for(".-.-.-.-.-"), None);
    }

    #[test]
    fn test_table_has_no_duplicate_patterns() {
        // A pattern shared by two characters would make decode ambiguous.
        assert_eq!(by_pattern().len(), CODE_TABLE.len());
        assert_eq!(by_char().len(), CODE_TABLE.len());
    }
}
