/*
 * language.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Ritagli, a web application utility toolkit.
 *
 * Ritagli is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Ritagli is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Ritagli.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Language guess from stopword frequency, for pages that declare no language.

/// (ISO 639-1 code, common function words). Words appearing in several lists still count for each.
const STOPWORDS: &[(&str, &[&str])] = &[
    (
        "en",
        &[
            "the", "and", "of", "to", "in", "is", "that", "for", "it", "with", "as", "was", "on",
            "are", "be", "this", "by", "from", "have", "or", "not", "you", "which", "an",
        ],
    ),
    (
        "es",
        &[
            "el", "la", "de", "que", "y", "en", "los", "del", "se", "las", "por", "un", "para",
            "con", "no", "una", "su", "al", "es", "lo", "como", "pero", "sus", "le", "ya", "muy",
        ],
    ),
    (
        "fr",
        &[
            "le", "la", "de", "et", "les", "des", "est", "un", "une", "du", "en", "que", "qui",
            "dans", "pour", "pas", "sur", "au", "avec", "il", "elle", "ce", "sont", "nous", "vous",
        ],
    ),
    (
        "de",
        &[
            "der", "die", "und", "in", "den", "von", "zu", "das", "mit", "sich", "des", "auf",
            "für", "ist", "im", "dem", "nicht", "ein", "eine", "als", "auch", "es", "an", "werden",
        ],
    ),
    (
        "it",
        &[
            "il", "di", "che", "e", "la", "per", "un", "in", "non", "una", "sono", "del", "della",
            "gli", "le", "con", "si", "da", "ma", "come", "anche", "questo", "nel", "alla",
        ],
    ),
    (
        "pt",
        &[
            "o", "de", "que", "e", "do", "da", "em", "um", "para", "com", "não", "uma", "os", "no",
            "se", "na", "por", "mais", "as", "dos", "como", "mas", "ao", "ele", "das", "seu",
        ],
    ),
    (
        "ca",
        &[
            "el", "la", "de", "i", "que", "els", "les", "en", "del", "per", "amb", "un", "una",
            "és", "al", "dels", "no", "com", "més", "però", "seu", "aquest", "també", "són",
        ],
    ),
    (
        "nl",
        &[
            "de", "het", "en", "van", "een", "in", "is", "dat", "op", "te", "zijn", "voor", "met",
            "niet", "die", "aan", "er", "om", "ook", "als", "bij", "maar", "wordt", "naar",
        ],
    ),
];

/// Most likely language of `text`, or None when no stopword is found.
/// Ties go to the language listed first.
pub fn guess_language(text: &str) -> Option<&'static str> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect();
    let mut best: Option<(&'static str, usize)> = None;
    for &(code, list) in STOPWORDS {
        let hits = words.iter().filter(|w| list.contains(&w.as_str())).count();
        if hits > 0 && best.map_or(true, |(_, b)| hits > b) {
            best = Some((code, hits));
        }
    }
    best.map(|(code, _)| code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_common_languages() {
        assert_eq!(
            guess_language("The quick brown fox jumps over the lazy dog and the cat"),
            Some("en")
        );
        assert_eq!(
            guess_language("El perro de los vecinos se come las flores del jardín para comer"),
            Some("es")
        );
        assert_eq!(
            guess_language("Der Hund und die Katze sind nicht auf dem Tisch, das ist gut"),
            Some("de")
        );
        assert_eq!(
            guess_language("Het is een mooie dag en de zon schijnt op het water van de rivier"),
            Some("nl")
        );
    }

    #[test]
    fn no_evidence_is_none() {
        assert_eq!(guess_language("12345 !!!"), None);
        assert_eq!(guess_language(""), None);
    }
}
