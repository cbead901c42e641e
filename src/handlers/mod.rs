pub mod deployment_handlers;
pub mod health_handlers;
pub mod upload_handlers;
