//! Fuzzy keyword generation for arbitrary business labels
//!
//! A small on-device recognizer without language-model context hears the
//! same spoken word in many surface forms. [`generate_keywords`] expands a
//! label such as a service-group name into every form worth registering:
//!
//! - the full normalized label
//! - each word of two or more letters
//! - phonetic confusions per word (b/v, c/s before e/i, z/s, ll/y, silent h,
//!   qu to k/c, initial x to s)
//! - acronyms spelled letter by letter and read as syllables
//! - contiguous 2-grams and 3-grams
//! - first syllable, last syllable and first two syllables of longer words
//!
//! Output order is fixed, so the same label always yields the same list.

use crate::normalize::normalize;
use std::collections::HashSet;

/// Words at least this long get syllable fragments
const SYLLABLE_MIN_LEN: usize = 4;

/// Longest token still considered an acronym
const ACRONYM_MAX_LEN: usize = 5;

/// Consonant pairs that open a syllable together
const ONSET_CLUSTERS: &[&str] = &[
    "bl", "br", "cl", "cr", "dr", "fl", "fr", "gl", "gr", "pl", "pr", "tr", "ch", "ll", "rr",
];

/// Ordered set that drops duplicates and fragments shorter than two letters
struct KeywordSet {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl KeywordSet {
    fn new() -> Self {
        Self {
            seen: HashSet::new(),
            ordered: Vec::new(),
        }
    }

    fn add(&mut self, keyword: impl Into<String>) {
        let keyword = keyword.into();
        if keyword.chars().count() < 2 {
            return;
        }
        if self.seen.insert(keyword.clone()) {
            self.ordered.push(keyword);
        }
    }
}

/// Expand `label` into registrable keywords
pub fn generate_keywords(label: &str) -> Vec<String> {
    let normalized = normalize(label);
    let words: Vec<&str> = normalized.split_whitespace().collect();
    let mut set = KeywordSet::new();

    set.add(normalized.clone());

    for word in words.iter().filter(|w| w.chars().count() >= 2) {
        set.add(*word);
    }

    for word in &words {
        for variant in phonetic_variants(word) {
            set.add(variant);
        }
    }

    for acronym in detect_acronyms(label) {
        set.add(spell_letters(&acronym));
        set.add(syllabify(&acronym).join(" "));
    }

    for n in [2, 3] {
        for gram in words.windows(n) {
            set.add(gram.join(" "));
        }
    }

    for word in words.iter().filter(|w| w.chars().count() >= SYLLABLE_MIN_LEN) {
        let syllables = syllabify(word);
        if let (Some(first), Some(last)) = (syllables.first(), syllables.last()) {
            set.add(first.clone());
            set.add(last.clone());
        }
        if syllables.len() >= 2 {
            set.add(format!("{}{}", syllables[0], syllables[1]));
        }
    }

    set.ordered
}

/// [`generate_keywords`] joined with commas, ready for command registration
pub fn keyword_csv(label: &str) -> String {
    generate_keywords(label).join(",")
}

/// Spellings a recognizer may produce for a normalized word
pub fn phonetic_variants(word: &str) -> Vec<String> {
    let candidates = [
        word.replace('b', "v"),
        word.replace('v', "b"),
        word.replace("ce", "se").replace("ci", "si"),
        word.replace("se", "ce").replace("si", "ci"),
        word.replace('z', "s"),
        word.replace('s', "z"),
        word.replace("ll", "y"),
        word.replace('y', "ll"),
        remove_silent_h(word),
        word.replace("qu", "k"),
        word.replace("qu", "c"),
        match word.strip_prefix('x') {
            Some(rest) => format!("s{}", rest),
            None => word.to_string(),
        },
    ];

    let mut variants: Vec<String> = Vec::new();
    for candidate in candidates {
        if candidate != word && !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

/// Drop every `h` that is not part of `ch`
fn remove_silent_h(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut previous = None;
    for c in word.chars() {
        if c != 'h' || previous == Some('c') {
            out.push(c);
        }
        previous = Some(c);
    }
    out
}

/// Uppercase tokens of the raw label that read as acronyms, lowercased.
///
/// In an all-caps label only single-token labels and tokens with at most one
/// vowel count, otherwise every word would be an acronym.
pub fn detect_acronyms(label: &str) -> Vec<String> {
    let tokens: Vec<&str> = label
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    let label_has_lowercase = label.chars().any(char::is_lowercase);

    tokens
        .iter()
        .filter(|token| {
            let len = token.chars().count();
            (2..=ACRONYM_MAX_LEN).contains(&len)
                && token.chars().all(|c| c.is_alphabetic() && c.is_uppercase())
                && (label_has_lowercase || tokens.len() == 1 || vowel_count(&normalize(token)) <= 1)
        })
        .map(|token| normalize(token))
        .collect()
}

/// Spanish letter names, e.g. "ruc" -> "erre u ce"
pub fn spell_letters(word: &str) -> String {
    word.chars()
        .map(letter_name)
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn letter_name(c: char) -> &'static str {
    match c {
        'a' => "a",
        'b' => "be",
        'c' => "ce",
        'd' => "de",
        'e' => "e",
        'f' => "efe",
        'g' => "ge",
        'h' => "hache",
        'i' => "i",
        'j' => "jota",
        'k' => "ka",
        'l' => "ele",
        'm' => "eme",
        'n' => "ene",
        'o' => "o",
        'p' => "pe",
        'q' => "cu",
        'r' => "erre",
        's' => "ese",
        't' => "te",
        'u' => "u",
        'v' => "uve",
        'w' => "doble ve",
        'x' => "equis",
        'y' => "ye",
        'z' => "zeta",
        _ => "",
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

fn vowel_count(word: &str) -> usize {
    word.chars().filter(|c| is_vowel(*c)).count()
}

/// Split a normalized word into approximate syllables.
///
/// Each run of vowels is a nucleus. Between two nuclei the following
/// syllable takes one consonant, or two when they form an onset cluster
/// such as "br" or "tr". Words without vowels come back whole.
pub fn syllabify(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();

    // (start, end) of each vowel run, end exclusive
    let mut nuclei = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if is_vowel(chars[i]) {
            let start = i;
            while i < chars.len() && is_vowel(chars[i]) {
                i += 1;
            }
            nuclei.push((start, i));
        } else {
            i += 1;
        }
    }

    if nuclei.len() <= 1 {
        return vec![word.to_string()];
    }

    let mut boundaries = vec![0];
    for pair in nuclei.windows(2) {
        let (_, prev_end) = pair[0];
        let (next_start, _) = pair[1];
        let consonants = next_start - prev_end;

        let onset = if consonants >= 2 {
            let cluster: String = chars[next_start - 2..next_start].iter().collect();
            if ONSET_CLUSTERS.contains(&cluster.as_str()) {
                2
            } else {
                1
            }
        } else {
            consonants
        };
        boundaries.push(next_start - onset);
    }
    boundaries.push(chars.len());

    boundaries
        .windows(2)
        .map(|w| chars[w[0]..w[1]].iter().collect())
        .collect()
}
