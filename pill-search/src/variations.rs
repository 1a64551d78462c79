//! Imprint variations
//!
//! Vision models and OCR regularly confuse glyphs that look alike on a
//! stamped pill surface (`0`/`O`, `1`/`I`/`l`, `8`/`B`, ...). This module
//! expands an imprint into a bounded list of alternate spellings so the
//! query can still hit the catalog entry after a misread.

use std::collections::HashSet;

/// Maximum number of variations generated for one imprint
pub const MAX_VARIATIONS: usize = 10;

const SIMILAR_CHARS: &[(char, &[char])] = &[
    ('0', &['O', 'o']),
    ('O', &['0', 'o']),
    ('o', &['0', 'O']),
    ('1', &['I', 'l']),
    ('I', &['1', 'l']),
    ('l', &['1', 'I']),
    ('2', &['Z']),
    ('Z', &['2']),
    ('3', &['E']),
    ('E', &['3']),
    ('4', &['A']),
    ('A', &['4']),
    ('5', &['S']),
    ('S', &['5']),
    ('6', &['G']),
    ('G', &['6']),
    ('7', &['T']),
    ('T', &['7']),
    ('8', &['B']),
    ('B', &['8']),
];

// Two-character windows misread as a unit. Single substitutions never
// produce these because both positions change at once.
const PAIR_CONFUSIONS: &[(&str, &[&str])] = &[
    ("10", &["IO", "lO"]),
    ("IO", &["10", "l0"]),
    ("18", &["IB", "lB"]),
    ("IB", &["18", "l8"]),
    ("52", &["SZ"]),
    ("SZ", &["52"]),
    ("73", &["EL"]),
    ("EL", &["73"]),
    ("rn", &["m"]),
];

fn similar_chars(c: char) -> &'static [char] {
    SIMILAR_CHARS
        .iter()
        .find(|(from, _)| *from == c)
        .map(|(_, alts)| *alts)
        .unwrap_or(&[])
}

fn digit_as_letter(c: char) -> char {
    match c {
        '0' => 'O',
        '1' => 'I',
        '2' => 'Z',
        '3' => 'E',
        '4' => 'A',
        '5' => 'S',
        '6' => 'G',
        '7' => 'T',
        '8' => 'B',
        other => other,
    }
}

fn letter_as_digit(c: char) -> char {
    match c {
        'l' => '1',
        _ => match c.to_ascii_uppercase() {
            'O' => '0',
            'I' => '1',
            'Z' => '2',
            'E' => '3',
            'A' => '4',
            'S' => '5',
            'G' => '6',
            'T' => '7',
            'B' => '8',
            _ => c,
        },
    }
}

/// Generate visually confusable spellings of `text`.
///
/// Sources, in output order: single-position substitutions, two-character
/// window substitutions, then the all-letters and all-digits forms when the
/// text mixes digits and letters. The result is de-duplicated, never
/// contains `text` itself and holds at most [`MAX_VARIATIONS`] entries.
pub fn imprint_variations(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut candidates = Vec::new();

    for (i, &c) in chars.iter().enumerate() {
        for &alt in similar_chars(c) {
            let mut variant = chars.clone();
            variant[i] = alt;
            candidates.push(variant.into_iter().collect::<String>());
        }
    }

    for i in 0..chars.len().saturating_sub(1) {
        let window: String = chars[i..i + 2].iter().collect();
        for (pattern, alts) in PAIR_CONFUSIONS {
            if window != *pattern {
                continue;
            }
            for alt in alts.iter() {
                let prefix: String = chars[..i].iter().collect();
                let suffix: String = chars[i + 2..].iter().collect();
                candidates.push(format!("{prefix}{alt}{suffix}"));
            }
        }
    }

    let has_digit = chars.iter().any(|c| c.is_ascii_digit());
    let has_letter = chars.iter().any(|c| c.is_alphabetic());
    if has_digit && has_letter {
        let letters: String = chars.iter().map(|&c| digit_as_letter(c)).collect();
        if letters != text {
            candidates.push(letters);
        }
        let digits: String = chars.iter().map(|&c| letter_as_digit(c)).collect();
        if digits != text {
            candidates.push(digits);
        }
    }

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|v| v != text && seen.insert(v.clone()))
        .take(MAX_VARIATIONS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_set(v: &[String]) -> HashSet<&str> {
        v.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(imprint_variations("").is_empty());
    }

    #[test]
    fn test_unmapped_characters_yield_nothing() {
        assert!(imprint_variations("XYK").is_empty());
        assert!(imprint_variations("마크").is_empty());
    }

    #[test]
    fn test_single_substitutions() {
        let v = imprint_variations("8B");
        assert_eq!(as_set(&v), HashSet::from(["BB", "88"]));
    }

    #[test]
    fn test_pair_confusion() {
        let v = imprint_variations("73");
        assert_eq!(as_set(&v), HashSet::from(["T3", "7E", "EL"]));
    }

    #[test]
    fn test_mixed_text_variations() {
        let v = imprint_variations("A10");
        assert_eq!(
            as_set(&v),
            HashSet::from(["410", "AI0", "Al0", "A1O", "A1o", "AIO", "AlO"])
        );
    }

    #[test]
    fn test_polarity_flip() {
        // both flips change two positions at once
        let v = imprint_variations("80BO");
        assert_eq!(v.len(), 8);
        assert!(v.contains(&"BOBO".to_string()));
        assert!(v.contains(&"8080".to_string()));
    }

    #[test]
    fn test_cap_and_exclusion() {
        for text in ["0O0O0O0O", "IB18IB18", "A1B2C3D4", "SZ52rn", "l1I"] {
            let v = imprint_variations(text);
            assert!(v.len() <= MAX_VARIATIONS, "{text}: {} variations", v.len());
            assert!(!v.contains(&text.to_string()));
            assert_eq!(as_set(&v).len(), v.len(), "duplicates for {text}");
        }
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(imprint_variations("IB18"), imprint_variations("IB18"));
    }
}
