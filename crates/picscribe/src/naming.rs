//! Derivation of filesystem-safe base names from free-text descriptions.

use crate::config::{CaseConversion, FilenameConfig};

/// Sentence punctuation dropped outright when `remove_punctuation` is set,
/// so "it's" becomes "its" instead of "it-s".
const DROPPED_PUNCTUATION: &[char] = &['\'', '"', '`', '.', ',', '!', '?', ';', ':'];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameOptions {
    pub case: CaseConversion,
    pub separator: char,
    pub max_length: usize,
    pub remove_punctuation: bool,
    pub fallback: String,
}

impl Default for NameOptions {
    fn default() -> Self {
        Self {
            case: CaseConversion::Lower,
            separator: '-',
            max_length: 100,
            remove_punctuation: true,
            fallback: "untitled".to_string(),
        }
    }
}

impl NameOptions {
    pub fn from_config(config: &FilenameConfig) -> Self {
        Self {
            case: config.case_conversion,
            separator: config.separator.chars().next().unwrap_or('-'),
            max_length: config.max_length.max(1),
            remove_punctuation: config.remove_punctuation,
            fallback: config.fallback_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NameDeriver {
    options: NameOptions,
}

impl NameDeriver {
    pub fn new(options: NameOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &NameOptions {
        &self.options
    }

    pub fn derive(&self, description: &str) -> String {
        derive(description, &self.options)
    }
}

/// Turns a description into a base name (no extension).
///
/// The result holds only ASCII alphanumerics and the separator, never starts or ends
/// with the separator and is at most `max_length` characters long. Input that
/// sanitizes to nothing yields the fallback name.
pub fn derive(description: &str, options: &NameOptions) -> String {
    let sep = options.separator;
    let cased = apply_case(description.trim(), options.case);

    let mut name = String::with_capacity(cased.len());
    for c in cased.chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c);
        } else if options.remove_punctuation && DROPPED_PUNCTUATION.contains(&c) {
            continue;
        } else if !name.is_empty() && !name.ends_with(sep) {
            name.push(sep);
        }
    }

    let name = truncate(name.trim_matches(sep), options.max_length, sep);
    if !name.is_empty() {
        return name;
    }

    let fallback = derive_fallback(&options.fallback, sep);
    truncate(&fallback, options.max_length, sep)
}

fn derive_fallback(fallback: &str, sep: char) -> String {
    let cleaned: String = fallback
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { sep })
        .collect();
    let cleaned = cleaned.trim_matches(sep);
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned.to_string()
    }
}

fn apply_case(text: &str, case: CaseConversion) -> String {
    match case {
        CaseConversion::Lower => text.to_lowercase(),
        CaseConversion::Upper => text.to_uppercase(),
        CaseConversion::None => text.to_string(),
        CaseConversion::Title => {
            let mut out = String::with_capacity(text.len());
            let mut at_word_start = true;
            for c in text.chars() {
                if c.is_alphanumeric() {
                    if at_word_start {
                        out.extend(c.to_uppercase());
                    } else {
                        out.extend(c.to_lowercase());
                    }
                    at_word_start = false;
                } else {
                    // Apostrophes stay inside a word: "dog's" -> "Dog's".
                    at_word_start = c != '\'';
                    out.push(c);
                }
            }
            out
        }
    }
}

/// Cuts to at most `max_chars`, preferring the last separator inside the limit.
fn truncate(name: &str, max_chars: usize, sep: char) -> String {
    if name.chars().count() <= max_chars {
        return name.to_string();
    }

    let cut: String = name.chars().take(max_chars).collect();
    let next_is_sep = name.chars().nth(max_chars) == Some(sep);
    if next_is_sep {
        return cut.trim_end_matches(sep).to_string();
    }

    match cut.rfind(sep) {
        Some(index) if index > 0 => cut[..index].trim_end_matches(sep).to_string(),
        _ => cut.trim_end_matches(sep).to_string(),
    }
}
