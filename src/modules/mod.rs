pub mod openapi;
pub mod posts;
pub mod products;
pub mod services;
pub mod view_slot;

use serde::Deserialize;
use vitrina_kernel::ModuleRegistry;

/// Body of the publish endpoints; a missing `published` flips the flag.
#[derive(Debug, Default, Deserialize)]
pub struct PublishChange {
    #[serde(default)]
    pub published: Option<bool>,
}

/// Register every content module, in start order.
pub fn register_all(registry: &mut ModuleRegistry) -> anyhow::Result<()> {
    registry.register(posts::create_module())?;
    registry.register(products::create_module())?;
    registry.register(services::create_module())?;
    Ok(())
}
