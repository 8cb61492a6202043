//! Storage layer: trait seams for the corpus, the link table, and the
//! analysis history, plus the in-memory reference backend.

mod error;
mod memory;
mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use traits::{AnalysisStore, ArticleStore, LinkStore, Upserted};
