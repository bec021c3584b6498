//! Language detection.
//!
//! Detection itself sits behind [`LanguageGuesser`], a pure `text -> tag`
//! function. The built-in [`StopwordLanguageGuesser`] scores text against small
//! stop-word profiles. The same profiles back [`StopWords`], which the tokenizer
//! stage and the label selection use to recognize function words.

mod filter;

pub use filter::{LanguageDetectionFilter, BUFFER_CAPACITY, TAGGED_COUNT};

use std::collections::HashSet;
use std::sync::LazyLock;

use crate::types::LanguageTag;

/// Guesses the language of a text. Returns `None` when nothing matches.
pub trait LanguageGuesser: Send + Sync {
    fn guess_language(&self, text: &str) -> Option<LanguageTag>;
}

impl<F> LanguageGuesser for F
where
    F: Fn(&str) -> Option<LanguageTag> + Send + Sync,
{
    fn guess_language(&self, text: &str) -> Option<LanguageTag> {
        self(text)
    }
}

// ─── Stop-word profiles ─────────────────────────────────────────────────────

const ENGLISH: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "am", "an", "and", "any", "are", "as", "at",
    "be", "because", "been", "before", "being", "between", "both", "but", "by", "can", "could",
    "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from", "further",
    "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his", "how", "i", "if",
    "in", "into", "is", "it", "its", "just", "me", "more", "most", "my", "no", "nor", "not",
    "now", "of", "off", "on", "once", "only", "or", "other", "our", "out", "over", "own", "same",
    "she", "should", "so", "some", "such", "than", "that", "the", "their", "them", "then",
    "there", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "very", "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why",
    "will", "with", "would", "you", "your",
];

const GERMAN: &[&str] = &[
    "aber", "alle", "als", "am", "an", "auch", "auf", "aus", "bei", "bin", "bis", "bist", "da",
    "damit", "dann", "das", "dass", "dem", "den", "der", "des", "die", "dies", "doch", "du",
    "durch", "ein", "eine", "einem", "einen", "einer", "es", "für", "hat", "hatte", "ich", "ihr",
    "im", "in", "ist", "ja", "kein", "mit", "nach", "nicht", "noch", "nur", "oder", "sich", "sie",
    "sind", "so", "über", "um", "und", "uns", "unter", "vom", "von", "vor", "war", "was", "weil",
    "wenn", "wie", "wir", "wird", "zu", "zum", "zur",
];

const FRENCH: &[&str] = &[
    "au", "aux", "avec", "ce", "ces", "dans", "de", "des", "du", "elle", "en", "est", "et", "eux",
    "il", "ils", "je", "la", "le", "les", "leur", "lui", "ma", "mais", "me", "mes", "moi", "mon",
    "ne", "nos", "notre", "nous", "ont", "ou", "par", "pas", "pour", "qu", "que", "qui", "sa",
    "se", "ses", "son", "sont", "sur", "ta", "te", "tes", "toi", "ton", "tu", "un", "une", "vos",
    "votre", "vous",
];

const SPANISH: &[&str] = &[
    "al", "algo", "como", "con", "de", "del", "el", "ella", "ellos", "en", "entre", "es", "esta",
    "este", "esto", "fue", "ha", "hay", "la", "las", "le", "les", "lo", "los", "mas", "más",
    "me", "mi", "muy", "no", "nos", "o", "para", "pero", "por", "porque", "que", "qué", "se",
    "ser", "si", "sin", "sobre", "son", "su", "sus", "también", "te", "tu", "un", "una", "y",
    "ya", "yo",
];

const ITALIAN: &[&str] = &[
    "a", "ai", "al", "alla", "alle", "anche", "che", "chi", "ci", "come", "con", "da", "dal",
    "dalla", "degli", "dei", "del", "della", "delle", "di", "e", "è", "gli", "ha", "hanno", "i",
    "il", "in", "io", "la", "le", "lo", "ma", "mi", "nel", "nella", "non", "per", "più", "quale",
    "questa", "questo", "si", "sono", "su", "sua", "suo", "tra", "un", "una", "uno",
];

const POLISH: &[&str] = &[
    "a", "aby", "ale", "bo", "być", "był", "była", "było", "czy", "dla", "do", "go", "i", "ich",
    "ja", "jak", "jako", "jej", "jest", "jego", "już", "ku", "lub", "ma", "mi", "na", "nad",
    "nie", "o", "od", "oraz", "po", "pod", "przez", "przy", "się", "są", "ta", "tak", "te",
    "tego", "tej", "ten", "to", "tu", "tylko", "w", "we", "więc", "z", "za", "ze", "że",
];

/// Profiles in tie-break order.
static PROFILES: LazyLock<Vec<(&'static str, StopWords)>> = LazyLock::new(|| {
    [
        ("en", ENGLISH),
        ("de", GERMAN),
        ("fr", FRENCH),
        ("es", SPANISH),
        ("it", ITALIAN),
        ("pl", POLISH),
    ]
    .into_iter()
    .map(|(code, words)| {
        let words = words.iter().copied().collect();
        (code, StopWords { words })
    })
    .collect()
});

static ALL_STOP_WORDS: LazyLock<StopWords> = LazyLock::new(|| StopWords {
    words: PROFILES
        .iter()
        .flat_map(|(_, profile)| profile.words.iter().copied())
        .collect(),
});

/// Set of lowercase function words.
#[derive(Debug, Clone, Default)]
pub struct StopWords {
    words: HashSet<&'static str>,
}

impl StopWords {
    /// Stop words of every built-in language.
    pub fn all() -> &'static StopWords {
        &ALL_STOP_WORDS
    }

    /// Stop words of one language, `None` for languages without a profile.
    pub fn for_language(code: &str) -> Option<&'static StopWords> {
        PROFILES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, profile)| profile)
    }

    /// Stop words for a detected language. Untagged documents and languages
    /// without a profile get the union of all lists.
    pub fn for_tag(language: Option<&LanguageTag>) -> &'static StopWords {
        language
            .and_then(|tag| Self::for_language(tag.as_str()))
            .unwrap_or_else(Self::all)
    }

    /// Expects a lowercased word.
    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Picks the language whose stop words occur most often in the text.
#[derive(Debug, Clone)]
pub struct StopwordLanguageGuesser {
    min_hits: usize,
}

impl StopwordLanguageGuesser {
    pub fn new() -> Self {
        Self { min_hits: 1 }
    }

    /// Minimum stop-word hits before any language is reported.
    pub fn with_min_hits(mut self, min_hits: usize) -> Self {
        self.min_hits = min_hits.max(1);
        self
    }

    pub fn supported_languages() -> impl Iterator<Item = &'static str> {
        PROFILES.iter().map(|(code, _)| *code)
    }
}

impl Default for StopwordLanguageGuesser {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageGuesser for StopwordLanguageGuesser {
    fn guess_language(&self, text: &str) -> Option<LanguageTag> {
        let mut hits = vec![0usize; PROFILES.len()];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            for (i, (_, words)) in PROFILES.iter().enumerate() {
                if words.contains(word.as_str()) {
                    hits[i] += 1;
                }
            }
        }

        // first maximum wins, so ties go to the earlier profile
        let mut best: Option<(usize, usize)> = None;
        for (i, &count) in hits.iter().enumerate() {
            if count >= self.min_hits && best.map_or(true, |(_, c)| count > c) {
                best = Some((i, count));
            }
        }
        best.map(|(i, _)| LanguageTag::new(PROFILES[i].0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_english() {
        let guesser = StopwordLanguageGuesser::new();
        let tag = guesser.guess_language("An introduction to the theory of machine learning");
        assert_eq!(tag, Some(LanguageTag::new("en")));
    }

    #[test]
    fn guesses_german_and_polish() {
        let guesser = StopwordLanguageGuesser::new();
        assert_eq!(
            guesser.guess_language("Das ist nicht nur für die Kinder und uns"),
            Some(LanguageTag::new("de"))
        );
        assert_eq!(
            guesser.guess_language("To jest już tylko dla nas, że się nie da"),
            Some(LanguageTag::new("pl"))
        );
    }

    #[test]
    fn no_stop_words_means_no_language() {
        let guesser = StopwordLanguageGuesser::new();
        assert_eq!(guesser.guess_language("Rust tokio nalgebra"), None);
        assert_eq!(guesser.guess_language(""), None);
    }

    #[test]
    fn min_hits_is_respected() {
        let guesser = StopwordLanguageGuesser::new().with_min_hits(3);
        assert_eq!(guesser.guess_language("the compiler"), None);
    }

    #[test]
    fn closures_are_guessers() {
        let fixed = |_: &str| Some(LanguageTag::new("xx"));
        assert_eq!(fixed.guess_language("anything"), Some(LanguageTag::new("xx")));
    }

    #[test]
    fn stop_word_sets() {
        let all = StopWords::all();
        assert!(all.contains("the"));
        assert!(all.contains("und"));
        assert!(!all.contains("machine"));

        let en = StopWords::for_language("en").unwrap();
        assert!(en.contains("how"));
        assert!(!en.contains("und"));
        assert!(StopWords::for_language("xx").is_none());
        assert!(all.len() > en.len());
        assert_eq!(StopwordLanguageGuesser::supported_languages().count(), 6);
    }

    #[test]
    fn stop_words_follow_the_detected_language() {
        let en = StopWords::for_tag(Some(&LanguageTag::new("en")));
        assert!(!en.contains("war"));
        assert!(en.contains("the"));

        let de = StopWords::for_tag(Some(&LanguageTag::new("de")));
        assert!(de.contains("war"));

        assert!(StopWords::for_tag(None).contains("war"));
        assert!(StopWords::for_tag(Some(&LanguageTag::new("xx"))).contains("war"));
    }
}
