// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Structured error type for voxfit APIs.
///
/// # Error Philosophy
/// - Shape and contract violations fail immediately; nothing is coerced.
/// - Degenerate numeric cases (constant columns) are NaN values, not errors.
/// - Variants are structured so sweep drivers can decide whether a failure
///   aborts one configuration or the whole run.
///
/// # Propagation
/// - `MissingArtifact`, `NotSupported` -> configuration-level, skip and report
/// - `InvalidInput`, `NumericalIssue`, `Io` -> run-level, abort
#[derive(thiserror::Error, Debug)]
pub enum VoxfitError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("numerical issue: {0}")]
    NumericalIssue(String),
    #[error("not supported: {0}")]
    NotSupported(String),
    #[error("missing artifact: {0}; run the upstream stage first")]
    MissingArtifact(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl VoxfitError {
    /// Creates a `VoxfitError::InvalidInput`.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Creates a `VoxfitError::NumericalIssue`.
    pub fn numerical_issue(msg: impl Into<String>) -> Self {
        Self::NumericalIssue(msg.into())
    }

    /// Creates a `VoxfitError::NotSupported`.
    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::NotSupported(msg.into())
    }

    /// Creates a `VoxfitError::MissingArtifact`.
    pub fn missing_artifact(msg: impl Into<String>) -> Self {
        Self::MissingArtifact(msg.into())
    }

    /// True when the failure only invalidates the configuration being fitted.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::MissingArtifact(_) | Self::NotSupported(_))
    }
}

/// Fails with `InvalidInput` unless `actual == expected`.
pub fn ensure_shape(
    what: &str,
    actual: &[usize],
    expected: &[usize],
) -> Result<(), VoxfitError> {
    if actual != expected {
        return Err(VoxfitError::invalid_input(format!(
            "{what}: shape mismatch, got {actual:?}, expected {expected:?}"
        )));
    }
    Ok(())
}
