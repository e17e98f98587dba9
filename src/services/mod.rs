pub mod object_key;
pub mod object_store;
pub mod session_registry;
pub mod sweeper;
pub mod upload_service;
