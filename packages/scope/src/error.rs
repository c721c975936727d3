use thiserror::Error;

pub type ScopeResult<T> = Result<T, ScopeError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScopeError {
    #[error("Computed value '{0}' has no setter")]
    NotSettable(String),

    #[error("Layer fragment for '{context}' has the wrong shape: {details}")]
    InvalidShape { context: String, details: String },

    #[error("Nothing provided under context key '{0}'")]
    NotProvided(String),
}
