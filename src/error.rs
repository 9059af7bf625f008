//! Error conditions surfaced to the dashboard user
//!
//! Missing-data conditions are never fatal to the session: the dashboard posts
//! them as an inline notice and keeps its previous state.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DashboardError {
    #[error("sample '{0}' not found")]
    SampleNotFound(String),

    #[error("feature '{0}' not found in the active sample")]
    FeatureNotFound(String),

    #[error("feature '{feature}' not found in the {kind} network")]
    NotInNetwork { feature: String, kind: String },

    #[error("no sample selected")]
    NoSampleSelected,

    #[error("no feature selected")]
    NoFeatureSelected,

    #[error("unknown network kind '{0}' (expected modified_cosine or ms2deepscore)")]
    UnknownNetworkKind(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

impl DashboardError {
    /// Conditions caused by absent data rather than bad input; posted to the view as a notice.
    pub fn is_missing_data(&self) -> bool {
        matches!(
            self,
            DashboardError::SampleNotFound(_)
                | DashboardError::FeatureNotFound(_)
                | DashboardError::NotInNetwork { .. }
                | DashboardError::NoSampleSelected
                | DashboardError::NoFeatureSelected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = DashboardError::NotInNetwork {
            feature: "12".to_string(),
            kind: "modified_cosine".to_string(),
        };
        assert_eq!(err.to_string(), "feature '12' not found in the modified_cosine network");
        assert!(err.is_missing_data());
        assert!(!DashboardError::MalformedPayload("x".into()).is_missing_data());
    }
}
