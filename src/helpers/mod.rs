pub mod slug;

pub use slug::{normalize_name, slugify};
