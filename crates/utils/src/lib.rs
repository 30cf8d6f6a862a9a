pub mod errors;
pub mod seed;
