use std::{collections::HashMap, fs, path::Path, sync::Arc};

use futures::future::BoxFuture;
use rand::seq::{IndexedRandom, index::sample};
use serde::Deserialize;
use tracing::info;

use super::{
    ContentError, ContentResult, ContentSource,
    models::{Answer, AnswerTitle, Category, CategoryId, CategoryType},
};

/// Category entry of the database file; `answers` lists answer ids.
#[derive(Debug, Clone, Deserialize)]
struct RawCategory {
    id: CategoryId,
    name: String,
    #[serde(rename = "type")]
    kind: CategoryType,
    #[serde(default)]
    answers: Vec<String>,
}

/// Answer entry of the database file; `categories` lists category ids.
#[derive(Debug, Clone, Deserialize)]
struct RawAnswer {
    id: String,
    title: AnswerTitle,
    #[serde(default)]
    categories: Vec<CategoryId>,
}

#[derive(Debug, Deserialize)]
struct RawDatabase {
    categories: Vec<RawCategory>,
    answers: Vec<RawAnswer>,
}

#[derive(Debug)]
struct Indexed {
    categories: HashMap<CategoryId, RawCategory>,
    answers: HashMap<String, RawAnswer>,
    by_type: HashMap<CategoryType, Vec<CategoryId>>,
}

/// In-memory movie database answering category and answer lookups.
#[derive(Debug, Clone)]
pub struct MovieDatabase {
    inner: Arc<Indexed>,
}

impl MovieDatabase {
    /// Load and index the database file at `path`.
    pub fn load(path: impl AsRef<Path>) -> ContentResult<Self> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let contents = fs::read_to_string(path).map_err(|source| ContentError::Read {
            path: shown.clone(),
            source,
        })?;
        let database = Self::from_json_str(&contents).map_err(|source| ContentError::Parse {
            path: shown.clone(),
            source,
        })?;
        info!(
            path = %shown,
            categories = database.inner.categories.len(),
            answers = database.inner.answers.len(),
            "loaded content database"
        );
        Ok(database)
    }

    /// Build a database from its JSON representation.
    pub fn from_json_str(contents: &str) -> serde_json::Result<Self> {
        let raw: RawDatabase = serde_json::from_str(contents)?;
        Ok(Self::index(raw))
    }

    fn index(raw: RawDatabase) -> Self {
        let mut by_type: HashMap<CategoryType, Vec<CategoryId>> = HashMap::new();
        for category in &raw.categories {
            by_type
                .entry(category.kind)
                .or_default()
                .push(category.id.clone());
        }

        Self {
            inner: Arc::new(Indexed {
                categories: raw
                    .categories
                    .into_iter()
                    .map(|category| (category.id.clone(), category))
                    .collect(),
                answers: raw
                    .answers
                    .into_iter()
                    .map(|answer| (answer.id.clone(), answer))
                    .collect(),
                by_type,
            }),
        }
    }
}

impl Indexed {
    fn public_category(&self, id: &str) -> Option<Category> {
        self.categories.get(id).map(|category| Category {
            id: category.id.clone(),
            name: category.name.clone(),
            kind: category.kind,
        })
    }

    fn random_categories(&self, count: usize, kind: CategoryType) -> Vec<Category> {
        let Some(ids) = self.by_type.get(&kind) else {
            return Vec::new();
        };
        let amount = count.max(1).min(ids.len());
        let mut rng = rand::rng();
        sample(&mut rng, ids.len(), amount)
            .into_iter()
            .filter_map(|index| self.public_category(&ids[index]))
            .collect()
    }

    fn random_answer(&self, category: &str) -> ContentResult<Answer> {
        let raw_category = self
            .categories
            .get(category)
            .ok_or_else(|| ContentError::UnknownCategory(category.to_string()))?;
        let answer = raw_category
            .answers
            .choose(&mut rand::rng())
            .and_then(|answer_id| self.answers.get(answer_id))
            .ok_or_else(|| ContentError::EmptyCategory(category.to_string()))?;

        Ok(Answer {
            id: answer.id.clone(),
            title: answer.title.clone(),
            categories: answer
                .categories
                .iter()
                .filter_map(|id| self.public_category(id))
                .collect(),
        })
    }
}

impl ContentSource for MovieDatabase {
    fn random_categories(
        &self,
        count: usize,
        kind: CategoryType,
    ) -> BoxFuture<'static, ContentResult<Vec<Category>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.random_categories(count, kind)) })
    }

    fn random_answer_for_category(
        &self,
        category: CategoryId,
    ) -> BoxFuture<'static, ContentResult<Answer>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.random_answer(&category) })
    }
}
