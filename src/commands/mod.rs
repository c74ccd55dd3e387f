pub mod library;
pub mod transfer;
