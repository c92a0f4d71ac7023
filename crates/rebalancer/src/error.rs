//! Error types for the rebalancing engine

use pairvault_core::PairCoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RebalancerError {
    #[error("Operation already in flight on strategy {0}")]
    Locked(String),

    #[error("External call failed ({collaborator}): {message}")]
    External {
        collaborator: &'static str,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Core error: {0}")]
    Core(#[from] PairCoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RebalancerError {
    /// Failure reported by a pool, lending, router, oracle or custody call
    pub fn external(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::External {
            collaborator,
            message: message.into(),
        }
    }

    pub fn invalid_config(field: &str, value: impl std::fmt::Display, expected: &str) -> Self {
        Self::InvalidConfig(format!("{} = {} (expected {})", field, value, expected))
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked(_))
    }
}

pub type EngineResult<T> = Result<T, RebalancerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RebalancerError::external("router", "slippage");
        assert_eq!(err.to_string(), "External call failed (router): slippage");

        let err = RebalancerError::invalid_config("min_health_factor", 0, "greater than 1e18");
        assert!(err.to_string().contains("min_health_factor = 0"));

        let err: RebalancerError = PairCoreError::DivisionByZero.into();
        assert!(matches!(err, RebalancerError::Core(_)));
        assert!(RebalancerError::Locked("s1".into()).is_locked());
    }
}
