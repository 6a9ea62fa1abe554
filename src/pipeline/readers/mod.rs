// src/pipeline/readers/mod.rs

pub mod base_reader;
pub mod image_reader;

pub use base_reader::BaseReader;
pub use image_reader::{is_supported_image, load_image, media_type_for, ImageReader};
