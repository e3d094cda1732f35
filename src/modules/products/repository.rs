use vitrina_db::{decode, DataError, Filter, Gateway, Row, Select};

use super::models::{Product, ProductDraft, PRODUCTS};

#[derive(Debug, Clone)]
pub struct ProductsRepository {
    gateway: Gateway,
}

impl ProductsRepository {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    fn newest_first() -> Select {
        Select::from(PRODUCTS).order_desc("created_at")
    }

    pub async fn list_published(&self) -> Result<Vec<Product>, DataError> {
        let query = Self::newest_first().eq("published", true);
        self.gateway.select_as(&query).await
    }

    pub async fn list_all(&self) -> Result<Vec<Product>, DataError> {
        self.gateway.select_as(&Self::newest_first()).await
    }

    pub async fn get_published_by_slug(&self, slug: &str) -> Result<Product, DataError> {
        let query = Select::from(PRODUCTS).eq("slug", slug).eq("published", true);
        decode(self.gateway.select_one(&query, "product", slug).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Product, DataError> {
        let query = Select::from(PRODUCTS).eq("id", id);
        decode(self.gateway.select_one(&query, "product", id).await?)
    }

    pub async fn create(&self, draft: &ProductDraft) -> Result<Product, DataError> {
        draft.validate()?;
        let stored = self.gateway.insert(PRODUCTS, draft.to_row()).await?;
        let product: Product = decode(stored)?;
        tracing::info!(product_id = %product.id, slug = %product.slug, "product created");
        Ok(product)
    }

    pub async fn update(&self, id: &str, draft: &ProductDraft) -> Result<Product, DataError> {
        draft.validate()?;
        let stored = self
            .gateway
            .update_one(PRODUCTS, draft.to_row(), &[Filter::eq("id", id)], "product", id)
            .await?;
        decode(stored)
    }

    pub async fn delete(&self, id: &str) -> Result<u64, DataError> {
        let removed = self.gateway.delete(PRODUCTS, &[Filter::eq("id", id)]).await?;
        tracing::info!(product_id = %id, removed, "product deleted");
        Ok(removed)
    }

    /// Partial update of the publish flag only.
    pub async fn set_published(&self, id: &str, published: bool) -> Result<Product, DataError> {
        let mut patch = Row::new();
        patch.insert("published".to_string(), published.into());
        let stored = self
            .gateway
            .update_one(PRODUCTS, patch, &[Filter::eq("id", id)], "product", id)
            .await?;
        decode(stored)
    }

    pub async fn toggle_published(&self, product: &Product) -> Result<Product, DataError> {
        self.set_published(&product.id, !product.published).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use vitrina_db::{ErrorKind, MemoryBackend, RetryPolicy, TableBackend, TableSpec};

    use super::*;
    use crate::utils::messages;

    fn repo() -> (ProductsRepository, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::with_tables(&[TableSpec::unique(
            PRODUCTS,
            &["slug"],
        )]));
        let gateway = Gateway::new(backend.clone(), RetryPolicy::new(3, 1, 5));
        (ProductsRepository::new(gateway), backend)
    }

    fn draft(title: &str) -> ProductDraft {
        ProductDraft {
            title: title.into(),
            description: "Descripción".into(),
            image_url: "https://cdn.example.com/p.jpg".into(),
            ebook_url: None,
            physical_url: Some("https://tienda.example.com/p".into()),
            published: true,
        }
    }

    #[tokio::test]
    async fn validation_fails_before_any_backend_call() {
        let (repo, backend) = repo();

        let no_image = ProductDraft {
            image_url: String::new(),
            ..draft("Sin portada")
        };
        let err = repo.create(&no_image).await.unwrap_err();
        assert_eq!(err, DataError::validation("image_url", messages::IMAGE_REQUIRED));

        let no_urls = ProductDraft {
            physical_url: Some(String::new()),
            ..draft("Sin enlaces")
        };
        let err = repo.create(&no_urls).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert_eq!(backend.calls(), 0);

        let ok = repo.create(&draft("Con un enlace")).await.unwrap();
        assert_eq!(ok.slug, "con-un-enlace");
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn public_list_hides_drafts() {
        let (repo, backend) = repo();
        for (id, published, day) in [("a", true, 1), ("b", false, 2), ("c", true, 3)] {
            backend
                .insert(
                    PRODUCTS,
                    vec![json!({
                        "id": id,
                        "title": id,
                        "slug": id,
                        "image_url": "x",
                        "published": published,
                        "created_at": format!("2024-05-0{day}T00:00:00Z"),
                    })
                    .as_object()
                    .cloned()
                    .unwrap()],
                )
                .await
                .unwrap();
        }

        let public: Vec<_> = repo
            .list_published()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(public, vec!["c", "a"]);
        assert_eq!(repo.list_all().await.unwrap().len(), 3);

        let err = repo.get_published_by_slug("b").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn duplicate_slug_surfaces_backend_message() {
        let (repo, _) = repo();
        repo.create(&draft("Mismo libro")).await.unwrap();

        let err = repo.create(&draft("Mismo libro")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Constraint);
        assert!(err.to_string().contains("products_slug_key"));
    }

    #[tokio::test]
    async fn toggle_skips_revalidation() {
        let (repo, backend) = repo();
        backend
            .insert(
                PRODUCTS,
                vec![json!({ "id": "legacy", "title": "Viejo", "slug": "viejo", "published": true })
                    .as_object()
                    .cloned()
                    .unwrap()],
            )
            .await
            .unwrap();

        let product = repo.get("legacy").await.unwrap();
        assert!(product.image_url.is_empty());

        let hidden = repo.toggle_published(&product).await.unwrap();
        assert!(!hidden.published);
    }

    #[tokio::test]
    async fn update_retries_transient_failures() {
        let (repo, backend) = repo();
        let created = repo.create(&draft("Primera edición")).await.unwrap();
        backend.fail_next(2);

        let updated = repo
            .update(&created.id, &draft("Segunda edición"))
            .await
            .unwrap();
        assert_eq!(updated.slug, "segunda-edici-n");
        assert_eq!(updated.id, created.id);
    }
}
