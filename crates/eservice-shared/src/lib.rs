pub mod constants;
pub mod error;
pub mod lifecycle;
pub mod types;
pub mod validation;
