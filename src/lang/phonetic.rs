//! Phonetic normalization for synthesis
//!
//! Remote and local synthesis voices mispronounce tonal and diacritic-heavy
//! orthographies when fed raw text. Normalization rewrites text into rough
//! phonetic ASCII before synthesis: a whole-word pass for common phrases
//! first, then ordered character/pattern substitutions for digraphs and
//! special letters. English passes through unchanged.
//!
//! Matching is case-insensitive; normalized output is lowercase.

/// Substitution rules for one language
struct RuleSet {
    /// Whole-word replacements, applied first
    words: &'static [(&'static str, &'static str)],
    /// Ordered pattern replacements (longest patterns listed first)
    patterns: &'static [(&'static str, &'static str)],
}

const TWI_RULES: RuleSet = RuleSet {
    words: &[
        ("medaase", "meh daah seh"),
        ("akwaaba", "ah kwaah bah"),
        ("aane", "aah neh"),
        ("daabi", "daah bi"),
        ("mepaakyɛw", "meh paah chow"),
        ("ɛte sɛn", "eh teh sen"),
    ],
    patterns: &[
        ("kyɛ", "cheh"),
        ("ky", "ch"),
        ("hyɛ", "sheh"),
        ("hy", "sh"),
        ("tw", "chw"),
        ("dw", "jw"),
        ("ɛ", "eh"),
        ("ɔ", "aw"),
    ],
};

const GA_RULES: RuleSet = RuleSet {
    words: &[
        ("ojekoo", "oh jeh koh"),
        ("oyiwala don", "oh yi wah lah dohn"),
    ],
    patterns: &[
        ("ŋm", "ngm"),
        ("ŋ", "ng"),
        ("ts", "ch"),
        ("ɛ", "eh"),
        ("ɔ", "aw"),
    ],
};

const EWE_RULES: RuleSet = RuleSet {
    words: &[("akpe", "ah kpeh"), ("woezɔ", "woh eh zaw")],
    patterns: &[
        ("ƒ", "f"),
        ("ʋ", "v"),
        ("ɖ", "d"),
        ("ŋ", "ng"),
        ("ɣ", "h"),
        ("ɛ", "eh"),
        ("ɔ", "aw"),
    ],
};

const HAUSA_RULES: RuleSet = RuleSet {
    words: &[("sannu", "sahn noo"), ("nagode", "nah goh deh")],
    patterns: &[
        ("ɓ", "b"),
        ("ɗ", "d"),
        ("ƙ", "k"),
        ("ƴ", "y"),
        ("'y", "y"),
    ],
};

const YORUBA_RULES: RuleSet = RuleSet {
    words: &[("ekaaro", "eh kaa roh"), ("ese", "eh sheh")],
    patterns: &[
        ("ṣ", "sh"),
        ("ẹ", "eh"),
        ("ọ", "aw"),
        ("á", "a"),
        ("à", "a"),
        ("é", "e"),
        ("è", "e"),
        ("í", "i"),
        ("ì", "i"),
        ("ó", "o"),
        ("ò", "o"),
        ("ú", "u"),
        ("ù", "u"),
    ],
};

fn rules_for(tag: &str) -> Option<&'static RuleSet> {
    match tag {
        "twi" => Some(&TWI_RULES),
        "gaa" => Some(&GA_RULES),
        "ewe" => Some(&EWE_RULES),
        "hau" => Some(&HAUSA_RULES),
        "yor" => Some(&YORUBA_RULES),
        _ => None,
    }
}

/// Rewrite text into rough phonetic ASCII for the given language.
///
/// Languages without substitution rules (including English) pass through
/// unchanged.
#[must_use]
pub fn normalize(text: &str, tag: &str) -> String {
    let Some(rules) = rules_for(tag) else {
        return text.to_string();
    };

    let lowered = text.to_lowercase();

    // Whole-word pass. Word rules may span multiple tokens ("ɛte sɛn"),
    // so match against the full string first, then token by token.
    let mut out = lowered;
    for (word, replacement) in rules.words {
        out = replace_word(&out, word, replacement);
    }

    // Character/pattern pass
    for (pattern, replacement) in rules.patterns {
        out = out.replace(pattern, replacement);
    }

    out
}

/// Replace `word` in `text` only at whitespace/punctuation boundaries
fn replace_word(text: &str, word: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find(word) {
        let before = if pos > 0 {
            rest[..pos].chars().next_back()
        } else {
            out.chars().next_back()
        };
        let before_ok = text_boundary(before);
        let after_ok = text_boundary(rest[pos + word.len()..].chars().next());

        out.push_str(&rest[..pos]);
        if before_ok && after_ok {
            out.push_str(replacement);
        } else {
            out.push_str(word);
        }
        rest = &rest[pos + word.len()..];
    }

    out.push_str(rest);
    out
}

fn text_boundary(c: Option<char>) -> bool {
    c.is_none_or(|c| !c.is_alphanumeric())
}
