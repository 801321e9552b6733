//! Version dispatch: one decision per request, made before any handler runs.

use crate::app::errors::ApiError;
use crate::context::RequestedVersion;

/// Versions served by the resource handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
    V2,
}

/// Resource families. They differ only in what a request without a version number means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Organisations,
    Users,
}

impl Resource {
    fn default_version(self) -> Option<ApiVersion> {
        match self {
            Self::Organisations => None,
            Self::Users => Some(ApiVersion::V1),
        }
    }
}

impl ApiVersion {
    pub fn resolve(requested: &RequestedVersion, resource: Resource) -> Result<Self, ApiError> {
        let resolved = match requested.number() {
            None => resource.default_version(),
            Some(1) => Some(Self::V1),
            Some(2) => Some(Self::V2),
            Some(_) => None,
        };

        resolved.ok_or_else(|| {
            tracing::warn!(
                api_version = requested.raw(),
                ?resource,
                "unsupported API version"
            );
            ApiError::UnsupportedVersion(requested.raw().to_string())
        })
    }
}
