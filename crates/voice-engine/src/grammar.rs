//! Recognition vocabulary built from registered keywords

use crate::commands::CommandTable;
use crate::numbers::DIGIT_WORDS;
use std::collections::BTreeSet;

/// Every individual word of every registered keyword, plus the digit words
/// when numeric dictation is expected.
pub fn vocabulary(commands: &CommandTable, include_digits: bool) -> BTreeSet<String> {
    let mut words: BTreeSet<String> = commands
        .keywords()
        .flat_map(str::split_whitespace)
        .map(str::to_string)
        .collect();

    if include_digits {
        words.extend(DIGIT_WORDS.iter().map(|w| w.to_string()));
    }

    words
}
