pub mod images;
pub mod library_store;

pub use images::{GcReport, ImageStore};
pub use library_store::LibraryStore;
