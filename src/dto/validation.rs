//! Validation helpers for DTOs.

use validator::ValidationError;

/// Maximum length of a room id.
const ROOM_ID_MAX_LEN: usize = 64;

/// Validates that a room id is 1 to 64 characters of ASCII letters, digits, `-` or `_`.
///
/// # Examples
///
/// ```ignore
/// validate_room_id("default")   // Ok
/// validate_room_id("movies_2")  // Ok
/// validate_room_id("a room")    // Err - space
/// ```
pub fn validate_room_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > ROOM_ID_MAX_LEN {
        let mut err = ValidationError::new("room_id_length");
        err.message = Some(
            format!(
                "Room ID must be between 1 and {ROOM_ID_MAX_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        let mut err = ValidationError::new("room_id_format");
        err.message =
            Some("Room ID must contain only letters, digits, dashes and underscores".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_room_id_valid() {
        assert!(validate_room_id("default").is_ok());
        assert!(validate_room_id("Movies-2_b").is_ok());
        assert!(validate_room_id(&"a".repeat(64)).is_ok());
    }

    #[test]
    fn test_validate_room_id_invalid_length() {
        assert!(validate_room_id("").is_err());
        assert!(validate_room_id(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_room_id_invalid_format() {
        assert!(validate_room_id("a room").is_err()); // space
        assert!(validate_room_id("room#1").is_err()); // key separator
        assert!(validate_room_id("salle-é").is_err()); // non-ascii
    }
}
