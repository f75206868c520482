//! UI-facing projection of a catalog query.

use super::CatalogError;

/// The state of a catalog query as the UI renders it.
#[derive(Debug, Clone, Default)]
pub enum QueryState<T> {
    #[default]
    Loading,
    Error(CatalogError),
    Success(T),
}

impl<T> QueryState<T> {
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Whether the query failed because the product does not exist, so the
    /// UI can show a not-found page rather than a generic error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Error(err) if err.is_not_found())
    }

    #[must_use]
    pub const fn data(&self) -> Option<&T> {
        match self {
            Self::Success(data) => Some(data),
            Self::Loading | Self::Error(_) => None,
        }
    }

    #[must_use]
    pub const fn error(&self) -> Option<&CatalogError> {
        match self {
            Self::Error(err) => Some(err),
            Self::Loading | Self::Success(_) => None,
        }
    }
}

impl<T> From<Result<T, CatalogError>> for QueryState<T> {
    fn from(result: Result<T, CatalogError>) -> Self {
        match result {
            Ok(data) => Self::Success(data),
            Err(err) => Self::Error(err),
        }
    }
}
