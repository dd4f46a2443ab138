//! Porter stemming algorithm.
//!
//! Follows Martin Porter's reference implementation (including the `bli` and
//! `logi` departures from the 1980 paper) and operates on lowercase ASCII
//! words, which is all the normalizer ever hands it.
//!
//! ```
//! use is_it_fake_preprocessing::pre_processor::porter;
//!
//! assert_eq!(porter::stem("running"), "run");
//! assert_eq!(porter::stem("ponies"), "poni");
//! assert_eq!(porter::stem("disappointed"), "disappoint");
//! ```

/// Upper bound on re-stemming passes in [`stem_to_fixpoint`].
const MAX_FIXPOINT_PASSES: usize = 8;

const STEP2_RULES: &[(&str, &str)] = &[
    ("ational", "ate"),
    ("tional", "tion"),
    ("enci", "ence"),
    ("anci", "ance"),
    ("izer", "ize"),
    ("bli", "ble"),
    ("alli", "al"),
    ("entli", "ent"),
    ("eli", "e"),
    ("ousli", "ous"),
    ("ization", "ize"),
    ("ation", "ate"),
    ("ator", "ate"),
    ("alism", "al"),
    ("iveness", "ive"),
    ("fulness", "ful"),
    ("ousness", "ous"),
    ("aliti", "al"),
    ("iviti", "ive"),
    ("biliti", "ble"),
    ("logi", "log"),
];

const STEP3_RULES: &[(&str, &str)] = &[
    ("icate", "ic"),
    ("ative", ""),
    ("alize", "al"),
    ("iciti", "ic"),
    ("ical", "ic"),
    ("ful", ""),
    ("ness", ""),
];

const STEP4_SUFFIXES: &[&str] = &[
    "al", "ance", "ence", "er", "ic", "able", "ible", "ant", "ement", "ment", "ent", "ion", "ou",
    "ism", "ate", "iti", "ous", "ive", "ize",
];

/// Word being stemmed. `stem_len` is the length of the part in front of the
/// most recently matched suffix.
struct Word {
    b: Vec<u8>,
    stem_len: usize,
}

impl Word {
    fn is_consonant(&self, i: usize) -> bool {
        match self.b[i] {
            b'a' | b'e' | b'i' | b'o' | b'u' => false,
            b'y' => i == 0 || !self.is_consonant(i - 1),
            _ => true,
        }
    }

    /// Number of vowel-consonant sequences in `b[..stem_len]`.
    fn measure(&self) -> usize {
        let end = self.stem_len;
        let mut i = 0;
        while i < end && self.is_consonant(i) {
            i += 1;
        }
        let mut m = 0;
        loop {
            while i < end && !self.is_consonant(i) {
                i += 1;
            }
            if i >= end {
                return m;
            }
            m += 1;
            while i < end && self.is_consonant(i) {
                i += 1;
            }
        }
    }

    fn vowel_in_stem(&self) -> bool {
        (0..self.stem_len).any(|i| !self.is_consonant(i))
    }

    /// `b[..len]` ends with a double consonant.
    fn double_consonant(&self, len: usize) -> bool {
        len >= 2 && self.b[len - 1] == self.b[len - 2] && self.is_consonant(len - 1)
    }

    /// consonant-vowel-consonant ending at `i`, where the final consonant is
    /// not `w`, `x` or `y`.
    fn cvc(&self, i: usize) -> bool {
        i >= 2
            && self.is_consonant(i)
            && !self.is_consonant(i - 1)
            && self.is_consonant(i - 2)
            && !matches!(self.b[i], b'w' | b'x' | b'y')
    }

    fn ends(&mut self, suffix: &str) -> bool {
        if self.b.ends_with(suffix.as_bytes()) {
            self.stem_len = self.b.len() - suffix.len();
            true
        } else {
            false
        }
    }

    fn set_to(&mut self, replacement: &str) {
        self.b.truncate(self.stem_len);
        self.b.extend_from_slice(replacement.as_bytes());
    }

    fn replace_if_measured(&mut self, replacement: &str) {
        if self.measure() > 0 {
            self.set_to(replacement);
        }
    }

    fn last(&self) -> Option<u8> {
        self.b.last().copied()
    }

    /// Plurals and `-ed` / `-ing`.
    fn step1ab(&mut self) {
        if self.last() == Some(b's') {
            if self.ends("sses") {
                self.b.truncate(self.b.len() - 2);
            } else if self.ends("ies") {
                self.set_to("i");
            } else if self.b.len() >= 2 && self.b[self.b.len() - 2] != b's' {
                self.b.pop();
            }
        }

        if self.ends("eed") {
            if self.measure() > 0 {
                self.b.pop();
            }
        } else if (self.ends("ed") || self.ends("ing")) && self.vowel_in_stem() {
            self.b.truncate(self.stem_len);
            if self.ends("at") {
                self.set_to("ate");
            } else if self.ends("bl") {
                self.set_to("ble");
            } else if self.ends("iz") {
                self.set_to("ize");
            } else if self.double_consonant(self.b.len()) {
                if !matches!(self.last(), Some(b'l' | b's' | b'z')) {
                    self.b.pop();
                }
            } else {
                self.stem_len = self.b.len();
                if self.measure() == 1 && self.cvc(self.b.len() - 1) {
                    self.b.push(b'e');
                }
            }
        }
    }

    /// Terminal `y` to `i` when there is another vowel in the stem.
    fn step1c(&mut self) {
        if self.ends("y") && self.vowel_in_stem() {
            let last = self.b.len() - 1;
            self.b[last] = b'i';
        }
    }

    fn apply_rules(&mut self, rules: &[(&str, &str)]) {
        if let Some((_, replacement)) = rules.iter().find(|(suffix, _)| self.ends(suffix)) {
            self.replace_if_measured(replacement);
        }
    }

    fn step4(&mut self) {
        let Some(suffix) = STEP4_SUFFIXES.iter().find(|suffix| self.ends(suffix)) else {
            return;
        };
        let ion_follows_s_or_t =
            self.stem_len >= 1 && matches!(self.b[self.stem_len - 1], b's' | b't');
        if *suffix == "ion" && !ion_follows_s_or_t {
            return;
        }
        if self.measure() > 1 {
            self.b.truncate(self.stem_len);
        }
    }

    /// Final `-e` and `-ll`.
    fn step5(&mut self) {
        self.stem_len = self.b.len();
        if self.last() == Some(b'e') {
            let m = self.measure();
            if m > 1 || (m == 1 && !self.cvc(self.b.len() - 2)) {
                self.b.pop();
            }
        }
        self.stem_len = self.b.len();
        if self.last() == Some(b'l') && self.double_consonant(self.b.len()) && self.measure() > 1 {
            self.b.pop();
        }
    }
}

/// Stems a single lowercase ASCII word. Words of one or two letters and words
/// containing anything other than `a-z` are returned unchanged.
#[must_use]
pub fn stem(word: &str) -> String {
    if word.len() <= 2 || !word.bytes().all(|b| b.is_ascii_lowercase()) {
        return word.to_owned();
    }
    let mut w = Word {
        b: word.as_bytes().to_vec(),
        stem_len: 0,
    };
    w.step1ab();
    if w.b.len() > 1 {
        w.step1c();
        w.apply_rules(STEP2_RULES);
        w.apply_rules(STEP3_RULES);
        w.step4();
        w.step5();
    }
    // Only ASCII bytes were ever written.
    String::from_utf8(w.b).unwrap_or_else(|_| word.to_owned())
}

/// Re-applies [`stem`] until the output stops changing, so that stemming an
/// already stemmed token is a no-op (`agreed` -> `agre` -> `agr`).
#[must_use]
pub fn stem_to_fixpoint(word: &str) -> String {
    let mut current = stem(word);
    for _ in 0..MAX_FIXPOINT_PASSES {
        let next = stem(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("caresses", "caress")]
    #[case("ponies", "poni")]
    #[case("ties", "ti")]
    #[case("cats", "cat")]
    #[case("feed", "feed")]
    #[case("agreed", "agre")]
    #[case("plastered", "plaster")]
    #[case("motoring", "motor")]
    #[case("sing", "sing")]
    #[case("conflated", "conflat")]
    #[case("hopping", "hop")]
    #[case("falling", "fall")]
    #[case("filing", "file")]
    #[case("happy", "happi")]
    #[case("relational", "relat")]
    #[case("conditional", "condit")]
    #[case("generalization", "gener")]
    #[case("hopefulness", "hope")]
    #[case("adjustment", "adjust")]
    #[case("adoption", "adopt")]
    #[case("controlling", "control")]
    #[case("amazing", "amaz")]
    #[case("arrived", "arriv")]
    #[case("disappointed", "disappoint")]
    #[case("product", "product")]
    #[case("great", "great")]
    fn test_stem(#[case] word: &str, #[case] expected: &str) {
        assert_eq!(stem(word), expected);
    }

    #[rstest]
    #[case("a")]
    #[case("is")]
    #[case("Caf\u{e9}")]
    fn test_stem_leaves_short_or_foreign_words(#[case] word: &str) {
        assert_eq!(stem(word), word);
    }

    #[rstest]
    #[case("agreed", "agr")]
    #[case("running", "run")]
    fn test_stem_to_fixpoint(#[case] word: &str, #[case] expected: &str) {
        let stemmed = stem_to_fixpoint(word);
        assert_eq!(stemmed, expected);
        assert_eq!(stem(&stemmed), stemmed);
    }
}
