pub mod error;
pub mod logger;
pub mod math;
pub mod validation;
