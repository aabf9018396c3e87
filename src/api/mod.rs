pub mod image_api;
pub mod simple;
