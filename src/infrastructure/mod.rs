//! Infrastructure layer: configuration, logging, persistence and HTTP client

pub mod config;
pub mod database_connection;
pub mod image_repository;
pub mod logging;
pub mod progress_store;
pub mod storage;
pub mod transform_client;

pub use config::{AppConfig, ConfigManager};
pub use database_connection::DatabaseConnection;
pub use image_repository::ImageRepository;
pub use progress_store::ProgressStore;
pub use storage::LocalImageStore;
pub use transform_client::TransformClient;
