pub mod object_store;
pub mod registry;
pub mod upload_service;
