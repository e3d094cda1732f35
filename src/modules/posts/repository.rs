use vitrina_db::{decode, DataError, Embed, Filter, Gateway, Row, Select};

use super::models::{
    link_row, Category, CategoryDraft, Post, PostDraft, PostRecord, CATEGORIES, POSTS,
    POST_CATEGORIES,
};

const POST_COLUMNS: [&str; 9] = [
    "id",
    "title",
    "slug",
    "excerpt",
    "content",
    "cover_image",
    "published",
    "created_at",
    "reading_time",
];

/// Reads and admin writes for posts and blog categories.
#[derive(Debug, Clone)]
pub struct PostsRepository {
    gateway: Gateway,
}

impl PostsRepository {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    /// Posts with their category join expanded, newest first.
    fn shaped() -> Select {
        Select::from(POSTS)
            .columns(POST_COLUMNS)
            .embed(
                Embed::has_many(POST_CATEGORIES, "post_id").embed(
                    Embed::belongs_to(CATEGORIES, "category_id")
                        .alias("category")
                        .columns(["id", "name", "slug"]),
                ),
            )
            .order_desc("created_at")
    }

    async fn fetch(&self, query: &Select) -> Result<Vec<Post>, DataError> {
        let rows = self.gateway.select(query).await?;
        rows.into_iter()
            .map(|row| decode::<PostRecord>(row).map(PostRecord::into_post))
            .collect()
    }

    /// Published posts, optionally narrowed to one category.
    ///
    /// Category narrowing reads the join table first and then selects the
    /// matching posts by id.
    pub async fn list_published(&self, category: Option<&str>) -> Result<Vec<Post>, DataError> {
        let mut query = Self::shaped().eq("published", true);

        if let Some(category_id) = category {
            let post_ids = self.post_ids_in(category_id).await?;
            if post_ids.is_empty() {
                return Ok(Vec::new());
            }
            query = query.is_in("id", post_ids);
        }

        self.fetch(&query).await
    }

    async fn post_ids_in(&self, category_id: &str) -> Result<Vec<String>, DataError> {
        let links = Select::from(POST_CATEGORIES)
            .columns(["post_id"])
            .eq("category_id", category_id);

        let mut ids: Vec<String> = Vec::new();
        for row in self.gateway.select(&links).await? {
            if let Some(id) = row.get("post_id").and_then(|v| v.as_str()) {
                if !ids.iter().any(|known| known == id) {
                    ids.push(id.to_string());
                }
            }
        }
        Ok(ids)
    }

    /// Every post, drafts included.
    pub async fn list_all(&self) -> Result<Vec<Post>, DataError> {
        self.fetch(&Self::shaped()).await
    }

    pub async fn get_published_by_slug(&self, slug: &str) -> Result<Post, DataError> {
        let query = Self::shaped().eq("slug", slug).eq("published", true);
        let row = self.gateway.select_one(&query, "post", slug).await?;
        Ok(decode::<PostRecord>(row)?.into_post())
    }

    pub async fn get(&self, id: &str) -> Result<Post, DataError> {
        let query = Self::shaped().eq("id", id);
        let row = self.gateway.select_one(&query, "post", id).await?;
        Ok(decode::<PostRecord>(row)?.into_post())
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, DataError> {
        let query = Select::from(CATEGORIES).order_asc("name");
        self.gateway.select_as(&query).await
    }

    pub async fn create_category(&self, draft: &CategoryDraft) -> Result<Category, DataError> {
        draft.validate()?;
        let row = self.gateway.insert(CATEGORIES, draft.to_row()).await?;
        decode(row)
    }

    /// Insert the post, then its category links. If linking fails the
    /// post row is removed again so a retry does not hit its own slug.
    pub async fn create(&self, draft: &PostDraft) -> Result<Post, DataError> {
        draft.validate()?;

        let stored = self.gateway.insert(POSTS, draft.to_row()).await?;
        let id = row_id(&stored)?;
        if let Err(err) = self.link_categories(&id, &draft.category_ids()).await {
            tracing::warn!(post_id = %id, error = %err, "linking categories failed; removing post");
            if let Err(cleanup) = self.gateway.delete(POSTS, &[Filter::eq("id", id.as_str())]).await {
                tracing::error!(post_id = %id, error = %cleanup, "could not remove unlinked post");
            }
            return Err(err);
        }

        tracing::info!(post_id = %id, "post created");
        self.get(&id).await
    }

    /// Replace a post's fields and category set.
    ///
    /// New links are written before stale ones are removed, so a failure
    /// part way leaves the post with at least its previous categories.
    pub async fn update(&self, id: &str, draft: &PostDraft) -> Result<Post, DataError> {
        draft.validate()?;

        self.gateway
            .update_one(POSTS, draft.to_row(), &[Filter::eq("id", id)], "post", id)
            .await?;

        let wanted = draft.category_ids();
        let current = self.linked_category_ids(id).await?;
        let missing: Vec<String> = wanted
            .iter()
            .filter(|category| !current.contains(category))
            .cloned()
            .collect();
        let stale: Vec<String> = current
            .into_iter()
            .filter(|category| !wanted.contains(category))
            .collect();

        self.link_categories(id, &missing).await?;
        if !stale.is_empty() {
            self.gateway
                .delete(
                    POST_CATEGORIES,
                    &[Filter::eq("post_id", id), Filter::is_in("category_id", stale)],
                )
                .await?;
        }

        tracing::info!(post_id = %id, "post updated");
        self.get(id).await
    }

    async fn linked_category_ids(&self, post_id: &str) -> Result<Vec<String>, DataError> {
        let links = Select::from(POST_CATEGORIES)
            .columns(["category_id"])
            .eq("post_id", post_id);

        let mut ids: Vec<String> = Vec::new();
        for row in self.gateway.select(&links).await? {
            if let Some(id) = row.get("category_id").and_then(|v| v.as_str()) {
                if !ids.iter().any(|known| known == id) {
                    ids.push(id.to_string());
                }
            }
        }
        Ok(ids)
    }

    async fn link_categories(&self, post_id: &str, category_ids: &[String]) -> Result<(), DataError> {
        let links: Vec<Row> = category_ids
            .iter()
            .map(|category_id| link_row(post_id, category_id))
            .collect();
        self.gateway.insert_many(POST_CATEGORIES, links).await?;
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<u64, DataError> {
        let removed = self.gateway.delete(POSTS, &[Filter::eq("id", id)]).await?;
        tracing::info!(post_id = %id, removed, "post deleted");
        Ok(removed)
    }

    /// Flip only the publish flag; other fields are not revalidated.
    pub async fn set_published(&self, id: &str, published: bool) -> Result<Post, DataError> {
        let mut patch = Row::new();
        patch.insert("published".to_string(), published.into());

        self.gateway
            .update_one(POSTS, patch, &[Filter::eq("id", id)], "post", id)
            .await?;
        self.get(id).await
    }

    pub async fn toggle_published(&self, post: &Post) -> Result<Post, DataError> {
        self.set_published(&post.id, !post.published).await
    }
}

fn row_id(row: &Row) -> Result<String, DataError> {
    row.get("id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| DataError::internal("stored row has no id"))
}
