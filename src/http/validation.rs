//! Request field validation
//!
//! Violations surface as 404, not 422; clients depend on that status.

const MAX_FIELD_CHARS: usize = 100;

/// Check a required field: 1 to 100 characters.
pub fn required_text(field: &str, value: &str) -> Result<(), String> {
    let chars = value.chars().count();

    if chars == 0 {
        return Err(format!("{} must not be empty", field));
    }
    if chars > MAX_FIELD_CHARS {
        return Err(format!(
            "{} must be at most {} characters",
            field, MAX_FIELD_CHARS
        ));
    }

    Ok(())
}

/// Check an optional query filter: at most 100 characters, empty allowed.
pub fn bounded_filter(field: &str, value: &str) -> Result<(), String> {
    if value.chars().count() > MAX_FIELD_CHARS {
        return Err(format!(
            "{} must be at most {} characters",
            field, MAX_FIELD_CHARS
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_required_field_fails() {
        assert!(required_text("storeName", "").is_err());
    }

    #[test]
    fn hundred_characters_pass() {
        let value = "s".repeat(100);

        assert!(required_text("storeName", &value).is_ok());
        assert!(bounded_filter("searchName", &value).is_ok());
    }

    #[test]
    fn hundred_and_one_characters_fail() {
        let value = "s".repeat(101);

        assert!(required_text("storeName", &value).is_err());
        assert!(bounded_filter("searchName", &value).is_err());
    }

    #[test]
    fn multibyte_values_count_characters_not_bytes() {
        // 100 Japanese characters are well over 100 bytes but still valid
        let value = "タ".repeat(100);
        assert!(required_text("storeName", &value).is_ok());

        let value = "タ".repeat(101);
        assert!(required_text("storeName", &value).is_err());
    }

    #[test]
    fn empty_filter_is_allowed() {
        assert!(bounded_filter("searchName", "").is_ok());
    }
}
