pub mod services;
pub mod traits;
pub mod transcoder;
