use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Invalid item: {0}")]
    Invalid(String),

    #[error("No document {id} in {collection}")]
    NotFound { collection: &'static str, id: String },
}
