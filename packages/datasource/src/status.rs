use std::fmt;

/// Per-source lifecycle state, scope-visible under the source's `status`
/// field. Re-enterable: a terminal state returns to `Loading` on reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSourceStatus {
    Init,
    Loading,
    Loaded,
    Error,
}

impl DataSourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSourceStatus::Init => "init",
            DataSourceStatus::Loading => "loading",
            DataSourceStatus::Loaded => "loaded",
            DataSourceStatus::Error => "error",
        }
    }
}

impl fmt::Display for DataSourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
