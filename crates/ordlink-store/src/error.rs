use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("similarity search failed: {0}")]
    Match(#[from] ordlink_match::MatchError),

    #[error("{0}")]
    Other(String),
}
