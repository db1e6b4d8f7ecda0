pub mod analyze;
pub mod chef;
pub mod signature;
