//! Text normalization shared by keywords and utterances

/// Lowercase, strip accents, turn punctuation into spaces and collapse runs
/// of whitespace.
///
/// Keywords and recognized utterances both go through this so that
/// substring matching compares like with like.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        let c = fold_accent(c);
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }

    out
}

/// Map an accented lowercase letter to its bare form
pub fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_and_accents() {
        assert_eq!(normalize("Odontología Pediátrica"), "odontologia pediatrica");
        assert_eq!(normalize("ÑANDÚ"), "nandu");
    }

    #[test]
    fn test_punctuation_collapses() {
        assert_eq!(normalize("¡Sí,   consulta!"), "si consulta");
        assert_eq!(normalize("  rayos-x  "), "rayos x");
    }

    #[test]
    fn test_digits_kept() {
        assert_eq!(normalize("Ventanilla 12"), "ventanilla 12");
    }

    #[test]
    fn test_empty() {
        assert_eq!(normalize(" ,.; "), "");
    }
}
