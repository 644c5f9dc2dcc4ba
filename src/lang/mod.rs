//! Supported languages and per-language voice tuning

mod phonetic;

pub use phonetic::normalize;

/// Voice tuning profile for one supported language
#[derive(Debug, Clone, Copy)]
pub struct LanguageProfile {
    /// Language tag used in cache keys and remote requests
    pub tag: &'static str,
    /// Human-readable name
    pub name: &'static str,
    /// Tonal language: defaults shift toward higher pitch, slower rate
    pub tonal: bool,
    /// Default speaking rate multiplier
    pub default_rate: f32,
    /// Default pitch multiplier
    pub default_pitch: f32,
}

/// Languages the subsystem can recognize and synthesize.
///
/// Tonal languages default to a higher pitch and slightly slower rate;
/// callers can override both per request.
pub const LANGUAGES: &[LanguageProfile] = &[
    LanguageProfile {
        tag: "en",
        name: "English",
        tonal: false,
        default_rate: 1.0,
        default_pitch: 1.0,
    },
    LanguageProfile {
        tag: "twi",
        name: "Twi",
        tonal: true,
        default_rate: 0.9,
        default_pitch: 1.15,
    },
    LanguageProfile {
        tag: "gaa",
        name: "Ga",
        tonal: true,
        default_rate: 0.9,
        default_pitch: 1.15,
    },
    LanguageProfile {
        tag: "ewe",
        name: "Ewe",
        tonal: true,
        default_rate: 0.9,
        default_pitch: 1.15,
    },
    LanguageProfile {
        tag: "hau",
        name: "Hausa",
        tonal: true,
        default_rate: 0.95,
        default_pitch: 1.1,
    },
    LanguageProfile {
        tag: "yor",
        name: "Yoruba",
        tonal: true,
        default_rate: 0.9,
        default_pitch: 1.15,
    },
];

/// Look up the profile for a language tag
#[must_use]
pub fn profile(tag: &str) -> Option<&'static LanguageProfile> {
    LANGUAGES.iter().find(|p| p.tag == tag)
}

/// Whether a language tag is supported
#[must_use]
pub fn is_supported(tag: &str) -> bool {
    profile(tag).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_is_supported() {
        assert!(is_supported("en"));
        let p = profile("en").unwrap();
        assert!(!p.tonal);
        assert!((p.default_rate - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn tonal_languages_slow_down_and_raise_pitch() {
        for tag in ["twi", "gaa", "ewe", "yor"] {
            let p = profile(tag).unwrap();
            assert!(p.tonal, "{tag} should be tonal");
            assert!(p.default_rate < 1.0, "{tag} rate");
            assert!(p.default_pitch > 1.0, "{tag} pitch");
        }
    }

    #[test]
    fn unknown_tag_is_unsupported() {
        assert!(!is_supported("fr"));
        assert!(profile("").is_none());
    }
}
