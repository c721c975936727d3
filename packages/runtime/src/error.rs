use montage_datasource::DataSourceError;
use montage_scope::ScopeError;
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Navigation guard timed out after {0} ms waiting for scope readiness")]
    GuardTimeout(u64),

    #[error("Lifecycle hook '{hook}' failed: {message}")]
    Hook { hook: String, message: String },

    #[error("No node registered under id '{0}'")]
    MissingNode(String),

    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    DataSource(#[from] DataSourceError),
}
