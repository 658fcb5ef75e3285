pub mod analytics;
pub mod health;
pub mod questions;
pub mod sessions;
