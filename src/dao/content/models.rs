use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifier of a quiz category (e.g. a genre or a director).
pub type CategoryId = String;

/// Kind of category offered to the teller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryType {
    /// Movie genre (drama, western, ...).
    Genre,
    /// Movie director.
    Director,
}

/// Category as exposed to players, without the answer index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Stable identifier.
    pub id: CategoryId,
    /// Display name.
    pub name: String,
    /// Kind of the category.
    #[serde(rename = "type")]
    pub kind: CategoryType,
}

/// Localized title variants for one language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedTitle {
    /// Title as released in that language.
    #[serde(default)]
    pub original: Option<String>,
    /// Adjusted spelling accepted as an alternative.
    #[serde(default)]
    pub adjusted: Option<String>,
}

/// Every accepted title of an answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerTitle {
    /// Main title.
    pub primary: String,
    /// Title in the original language.
    #[serde(default)]
    pub original: Option<String>,
    /// Per-language variants keyed by language code.
    #[serde(default)]
    pub localized: BTreeMap<String, LocalizedTitle>,
}

/// Answer to be guessed during a round, with its categories resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// Stable identifier.
    pub id: String,
    /// Accepted titles.
    pub title: AnswerTitle,
    /// Categories the answer belongs to.
    #[serde(default)]
    pub categories: Vec<Category>,
}
