use crate::dao::content::models::Answer;

/// Normalize a title or a guess: drop whitespace and punctuation, lowercase the rest.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && !c.is_ascii_punctuation())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Every accepted title of `answer`, normalized and de-duplicated.
pub fn accepted_titles(answer: &Answer) -> Vec<String> {
    let title = &answer.title;
    let localized = title
        .localized
        .values()
        .flat_map(|variant| [variant.original.as_deref(), variant.adjusted.as_deref()]);

    let mut titles: Vec<String> = std::iter::once(Some(title.primary.as_str()))
        .chain(std::iter::once(title.original.as_deref()))
        .chain(localized)
        .flatten()
        .map(normalize)
        .filter(|normalized| !normalized.is_empty())
        .collect();
    titles.sort();
    titles.dedup();
    titles
}

/// Whether `guess` matches one of the normalized `titles`.
pub fn is_correct(guess: &str, titles: &[String]) -> bool {
    let guess = normalize(guess);
    !guess.is_empty() && titles.iter().any(|title| *title == guess)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::dao::content::models::{AnswerTitle, LocalizedTitle};

    fn answer() -> Answer {
        let mut localized = BTreeMap::new();
        localized.insert(
            "tr".to_string(),
            LocalizedTitle {
                original: Some("Kuzuların Sessizliği".into()),
                adjusted: Some("kuzularin sessizligi".into()),
            },
        );
        localized.insert(
            "fr".to_string(),
            LocalizedTitle {
                original: Some("Le Silence des agneaux".into()),
                adjusted: None,
            },
        );
        Answer {
            id: "silence".into(),
            title: AnswerTitle {
                primary: "The Silence of the Lambs".into(),
                original: Some("The Silence of the Lambs".into()),
                localized,
            },
            categories: Vec::new(),
        }
    }

    #[test]
    fn normalize_strips_punctuation_and_case() {
        assert_eq!(normalize("  The Matrix!! "), "thematrix");
        assert_eq!(normalize("Mad Max: Fury-Road."), "madmaxfuryroad");
        assert_eq!(normalize("?!."), "");
    }

    #[test]
    fn titles_include_every_variant_once() {
        let titles = accepted_titles(&answer());
        assert_eq!(
            titles,
            vec![
                "kuzularinsessizligi".to_string(),
                "kuzuların sessizliği".replace(' ', ""),
                "lesilencedesagneaux".to_string(),
                "thesilenceofthelambs".to_string(),
            ]
        );
    }

    #[test]
    fn guesses_match_regardless_of_case_and_punctuation() {
        let titles = accepted_titles(&answer());
        assert!(is_correct("the silence, of the LAMBS", &titles));
        assert!(is_correct("Le silence des agneaux!", &titles));
        assert!(!is_correct("the silence", &titles));
        assert!(!is_correct("...", &titles));
    }
}
