pub mod health_handlers;
pub mod memory_store_handlers;
pub mod upload_handlers;
