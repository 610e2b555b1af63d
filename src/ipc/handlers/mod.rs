pub mod core;
pub mod courses;
pub mod grades;
pub mod items;
pub mod setup;
pub mod transcript;
pub mod weights;
