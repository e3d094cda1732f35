use vitrina_db::{decode, DataError, Filter, Gateway, Select};

use super::models::{Service, ServiceDraft, SERVICES};

#[derive(Debug, Clone)]
pub struct ServicesRepository {
    gateway: Gateway,
}

impl ServicesRepository {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub async fn list(&self) -> Result<Vec<Service>, DataError> {
        let query = Select::from(SERVICES).order_asc("order_index");
        self.gateway.select_as(&query).await
    }

    pub async fn get(&self, id: &str) -> Result<Service, DataError> {
        let query = Select::from(SERVICES).eq("id", id);
        decode(self.gateway.select_one(&query, "service", id).await?)
    }

    pub async fn create(&self, draft: &ServiceDraft) -> Result<Service, DataError> {
        let icon = draft.validate()?;
        let stored = self.gateway.insert(SERVICES, draft.to_row(icon)).await?;
        let service: Service = decode(stored)?;
        tracing::info!(service_id = %service.id, %icon, "service created");
        Ok(service)
    }

    pub async fn update(&self, id: &str, draft: &ServiceDraft) -> Result<Service, DataError> {
        let icon = draft.validate()?;
        let stored = self
            .gateway
            .update_one(SERVICES, draft.to_row(icon), &[Filter::eq("id", id)], "service", id)
            .await?;
        decode(stored)
    }

    pub async fn delete(&self, id: &str) -> Result<u64, DataError> {
        self.gateway.delete(SERVICES, &[Filter::eq("id", id)]).await
    }
}
