use thiserror::Error;

#[derive(Error, Debug)]
pub enum StratmapError {
    // Configuration errors - raised eagerly, before any work is done
    #[error("Invalid grid dimensions {width}x{height}: both must be nonzero")]
    InvalidGridDimensions { width: u32, height: u32 },

    #[error("Invalid cell size {cell_size}: must be positive")]
    InvalidCellSize { cell_size: f32 },

    #[error(
        "Height field size {actual} does not match dimensions {width}x{height} (expected {expected})"
    )]
    HeightFieldSizeMismatch {
        actual: usize,
        width: u32,
        height: u32,
        expected: usize,
    },

    #[error("Invalid terrain feature: {reason}")]
    InvalidFeature { reason: String },

    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    // Placement errors
    #[error("No valid candidate positions for {context}")]
    NoValidCandidates { context: String },
}

impl StratmapError {
    /// Flatten validator output into a single readable configuration error.
    pub fn from_validation(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .iter()
            .map(|(field, errors)| {
                let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                format!("{field}: {}", msgs.join(", "))
            })
            .collect::<Vec<String>>()
            .join("; ");

        StratmapError::InvalidConfiguration { reason: details }
    }
}

/// Result type alias for all operations
pub type StratmapResult<T> = Result<T, StratmapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StratmapError::InvalidGridDimensions {
            width: 0,
            height: 10,
        };
        assert!(err.to_string().contains("0x10"));

        let err = StratmapError::NoValidCandidates {
            context: "castle placement".to_string(),
        };
        assert!(err.to_string().contains("castle placement"));
    }
}
