pub mod image_validator;

pub use image_validator::ImageValidator;
