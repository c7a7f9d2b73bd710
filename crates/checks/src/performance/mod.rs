// Performance checks

pub mod image_functions;

pub use image_functions::ImageFunctionsCheck;
