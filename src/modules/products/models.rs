use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use vitrina_db::{DataError, Row};

use crate::utils::{is_blank, messages, non_blank, slugify};

pub const PRODUCTS: &str = "products";

/// A book offered as ebook, print, or both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub ebook_url: Option<String>,
    #[serde(default)]
    pub physical_url: Option<String>,
    #[serde(default)]
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub ebook_url: Option<String>,
    #[serde(default)]
    pub physical_url: Option<String>,
    #[serde(default)]
    pub published: bool,
}

impl ProductDraft {
    /// Checked before any backend call. The image comes first so the
    /// editor reports the missing upload before anything else.
    pub fn validate(&self) -> Result<(), DataError> {
        if is_blank(&self.image_url) {
            return Err(DataError::validation("image_url", messages::IMAGE_REQUIRED));
        }
        if is_blank(&self.title) {
            return Err(DataError::validation("title", messages::TITLE_REQUIRED));
        }
        if slugify(&self.title).is_empty() {
            return Err(DataError::validation("title", messages::TITLE_WITHOUT_SLUG));
        }
        if is_blank(&self.description) {
            return Err(DataError::validation("description", messages::DESCRIPTION_REQUIRED));
        }
        if non_blank(self.ebook_url.clone()).is_none() && non_blank(self.physical_url.clone()).is_none()
        {
            return Err(DataError::validation("ebook_url", messages::EDITION_URL_REQUIRED));
        }
        Ok(())
    }

    pub fn to_row(&self) -> Row {
        let row = json!({
            "title": self.title.trim(),
            "slug": slugify(&self.title),
            "description": self.description,
            "image_url": self.image_url.trim(),
            "ebook_url": non_blank(self.ebook_url.clone()),
            "physical_url": non_blank(self.physical_url.clone()),
            "published": self.published,
        });
        match row {
            Value::Object(map) => map,
            _ => Row::new(),
        }
    }
}
