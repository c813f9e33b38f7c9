//! Business logic behind the HTTP handlers.

pub mod file_service;

pub use file_service::FileService;
