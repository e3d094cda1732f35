use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use vitrina_db::{DataError, Row};

use crate::utils::{estimate_reading_time, is_blank, messages, non_blank, slugify};

pub const POSTS: &str = "posts";
pub const CATEGORIES: &str = "blog_categories";
pub const POST_CATEGORIES: &str = "blog_post_categories";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
}

/// Blog post with its categories attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image: Option<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    /// Minutes.
    pub reading_time: Option<u32>,
    pub categories: Vec<Category>,
}

/// Post row as read, with its join rows embedded.
#[derive(Debug, Deserialize)]
pub(crate) struct PostRecord {
    id: String,
    title: String,
    slug: String,
    #[serde(default)]
    excerpt: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    cover_image: Option<String>,
    #[serde(default)]
    published: bool,
    created_at: DateTime<Utc>,
    #[serde(default)]
    reading_time: Option<u32>,
    #[serde(default)]
    blog_post_categories: Vec<CategoryLink>,
}

/// A join row; `category` is null when the category was deleted.
#[derive(Debug, Deserialize)]
struct CategoryLink {
    #[serde(default)]
    category: Option<Category>,
}

impl PostRecord {
    /// Flatten join rows into categories, dropping nulls and repeats.
    pub(crate) fn into_post(self) -> Post {
        let mut seen = HashSet::new();
        let categories = self
            .blog_post_categories
            .into_iter()
            .filter_map(|link| link.category)
            .filter(|category| seen.insert(category.id.clone()))
            .collect();

        Post {
            id: self.id,
            title: self.title,
            slug: self.slug,
            excerpt: self.excerpt,
            content: self.content,
            cover_image: self.cover_image,
            published: self.published,
            created_at: self.created_at,
            reading_time: self.reading_time,
            categories,
        }
    }
}

/// Admin input for creating or replacing a post.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub published: bool,
    /// Estimated from `content` when absent.
    #[serde(default)]
    pub reading_time: Option<u32>,
    #[serde(default)]
    pub category_ids: Vec<String>,
}

impl PostDraft {
    pub fn validate(&self) -> Result<(), DataError> {
        if is_blank(&self.title) {
            return Err(DataError::validation("title", messages::TITLE_REQUIRED));
        }
        if slugify(&self.title).is_empty() {
            return Err(DataError::validation("title", messages::TITLE_WITHOUT_SLUG));
        }
        if is_blank(&self.content) {
            return Err(DataError::validation("content", messages::CONTENT_REQUIRED));
        }
        Ok(())
    }

    /// Column values for the `posts` table.
    pub fn to_row(&self) -> Row {
        let reading_time = self
            .reading_time
            .unwrap_or_else(|| estimate_reading_time(&self.content));

        let row = json!({
            "title": self.title.trim(),
            "slug": slugify(&self.title),
            "excerpt": non_blank(self.excerpt.clone()),
            "content": self.content,
            "cover_image": non_blank(self.cover_image.clone()),
            "published": self.published,
            "reading_time": reading_time,
        });
        into_row(row)
    }

    /// Category ids without repeats, in the order given.
    pub fn category_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.category_ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty() && seen.insert(id.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryDraft {
    #[serde(default)]
    pub name: String,
}

impl CategoryDraft {
    pub fn validate(&self) -> Result<(), DataError> {
        if is_blank(&self.name) {
            return Err(DataError::validation("name", messages::CATEGORY_NAME_REQUIRED));
        }
        if slugify(&self.name).is_empty() {
            return Err(DataError::validation("name", messages::TITLE_WITHOUT_SLUG));
        }
        Ok(())
    }

    pub fn to_row(&self) -> Row {
        into_row(json!({
            "name": self.name.trim(),
            "slug": slugify(&self.name),
        }))
    }
}

pub(crate) fn link_row(post_id: &str, category_id: &str) -> Row {
    into_row(json!({ "post_id": post_id, "category_id": category_id }))
}

fn into_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: Value) -> PostRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn drops_deleted_and_repeated_categories() {
        let post = record(json!({
            "id": "p1",
            "title": "Hola",
            "slug": "hola",
            "content": "texto",
            "published": true,
            "created_at": "2024-03-01T10:00:00+00:00",
            "blog_post_categories": [
                { "category": { "id": "a", "name": "Liderazgo", "slug": "liderazgo" } },
                { "category": null },
                { "category": { "id": "b", "name": "Escritura", "slug": "escritura" } },
                { "category": { "id": "a", "name": "Liderazgo", "slug": "liderazgo" } }
            ]
        }))
        .into_post();

        let ids: Vec<_> = post.categories.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn post_without_join_rows_has_no_categories() {
        let post = record(json!({
            "id": "p1",
            "title": "Hola",
            "slug": "hola",
            "created_at": "2024-03-01T10:00:00Z"
        }))
        .into_post();
        assert!(post.categories.is_empty());
        assert!(!post.published);
    }

    #[test]
    fn draft_requires_title_and_content() {
        let draft = PostDraft {
            title: "  ".into(),
            content: "cuerpo".into(),
            ..PostDraft::default()
        };
        assert_eq!(
            draft.validate(),
            Err(DataError::validation("title", messages::TITLE_REQUIRED))
        );

        let draft = PostDraft {
            title: "Título".into(),
            ..PostDraft::default()
        };
        assert_eq!(
            draft.validate().unwrap_err(),
            DataError::validation("content", messages::CONTENT_REQUIRED)
        );
    }

    #[test]
    fn punctuation_only_names_are_rejected() {
        let draft = PostDraft {
            title: "¿¡…!?".into(),
            content: "cuerpo".into(),
            ..PostDraft::default()
        };
        assert_eq!(
            draft.validate(),
            Err(DataError::validation("title", messages::TITLE_WITHOUT_SLUG))
        );

        let category = CategoryDraft { name: "ñ".into() };
        assert_eq!(
            category.validate(),
            Err(DataError::validation("name", messages::TITLE_WITHOUT_SLUG))
        );
        assert!(CategoryDraft { name: "Ñandú 2".into() }.validate().is_ok());
    }

    #[test]
    fn draft_row_derives_slug_and_reading_time() {
        let draft = PostDraft {
            title: "¡Hola, Mundo!  2024".into(),
            content: "uno dos tres".into(),
            excerpt: Some("   ".into()),
            ..PostDraft::default()
        };
        let row = draft.to_row();

        assert_eq!(row["slug"], "hola-mundo-2024");
        assert_eq!(row["reading_time"], 1);
        assert_eq!(row["excerpt"], Value::Null);
        assert_eq!(row["published"], false);
    }

    #[test]
    fn category_ids_are_trimmed_and_unique() {
        let draft = PostDraft {
            category_ids: vec!["a".into(), " b ".into(), "a".into(), "".into()],
            ..PostDraft::default()
        };
        assert_eq!(draft.category_ids(), vec!["a", "b"]);
    }
}
