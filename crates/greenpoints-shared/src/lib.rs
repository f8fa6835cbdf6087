pub mod constants;
pub mod credential;
pub mod error;
pub mod signal;
pub mod types;
