//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::poll::Timestamp;

/// Rejects strings that are empty once trimmed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Rejects timestamps that are not RFC 3339, e.g. `2024-05-01T18:00:00Z`.
pub fn validate_rfc3339(value: &str) -> Result<(), ValidationError> {
    Timestamp::parse(value.trim()).map(|_| ()).map_err(|parse| {
        let mut err = ValidationError::new("rfc3339");
        err.message = Some(format!("Expected an RFC 3339 timestamp ({parse})").into());
        err
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_rejected() {
        assert!(validate_not_blank("Dune").is_ok());
        assert!(validate_not_blank("  ").is_err());
        assert!(validate_not_blank("").is_err());
    }

    #[test]
    fn timestamps_must_be_rfc3339() {
        assert!(validate_rfc3339("2024-05-01T18:00:00Z").is_ok());
        assert!(validate_rfc3339("2024-05-01T18:00:00.250+02:00").is_ok());
        assert!(validate_rfc3339("tomorrow").is_err());
        assert!(validate_rfc3339("2024-05-01").is_err());
    }
}
