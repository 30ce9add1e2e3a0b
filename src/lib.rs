pub mod camera;
pub mod config;
pub mod error;
pub mod render_system;
pub mod utils;
