//! Spoken digit extraction for numeric dictation

/// Spanish digit words in digit order
pub const DIGIT_WORDS: [&str; 10] = [
    "cero", "uno", "dos", "tres", "cuatro", "cinco", "seis", "siete", "ocho", "nueve",
];

/// Concatenate every digit found in a normalized utterance.
///
/// Digit words ("cero".."nueve") and literal numerals are both accepted and
/// kept in spoken order. Returns `None` when no digit is present.
pub fn extract_digits(normalized: &str) -> Option<String> {
    let mut digits = String::new();

    for token in normalized.split_whitespace() {
        if let Some(value) = DIGIT_WORDS.iter().position(|word| *word == token) {
            digits.push(char::from(b'0' + value as u8));
        } else {
            digits.extend(token.chars().filter(char::is_ascii_digit));
        }
    }

    (!digits.is_empty()).then_some(digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_words() {
        assert_eq!(extract_digits("uno siete cero nueve").as_deref(), Some("1709"));
    }

    #[test]
    fn test_mixed_words_and_numerals() {
        assert_eq!(extract_digits("mi cedula es 17 cero 45").as_deref(), Some("17045"));
    }

    #[test]
    fn test_no_digits() {
        assert_eq!(extract_digits("consulta externa"), None);
        assert_eq!(extract_digits(""), None);
    }

    #[test]
    fn test_words_inside_other_words_ignored() {
        // "dos" inside "todos" is not a digit
        assert_eq!(extract_digits("todos los servicios"), None);
    }
}
