pub mod config;
pub mod entities;
pub mod ollama;
pub mod traits;
