pub mod bundle;
pub mod library;
