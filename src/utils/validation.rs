use crate::error::{RecError, RecResult};

const MAX_ID_LEN: usize = 256;

pub fn validate_id(kind: &str, id: &str) -> RecResult<()> {
    if id.trim().is_empty() {
        return Err(RecError::InvalidArgument(format!("{} id cannot be empty", kind)));
    }

    if id.len() > MAX_ID_LEN {
        return Err(RecError::InvalidArgument(format!(
            "{} id too long (max {} characters)",
            kind, MAX_ID_LEN
        )));
    }

    Ok(())
}

/// Rejects 0 and clamps anything above `max_limit`.
pub fn validate_limit(limit: usize, max_limit: usize) -> RecResult<usize> {
    if limit == 0 {
        return Err(RecError::InvalidArgument(
            "Number of recommendations must be greater than 0".to_string(),
        ));
    }

    Ok(limit.min(max_limit))
}

pub fn validate_keyword(keyword: &str) -> RecResult<&str> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(RecError::InvalidArgument("Search keyword cannot be empty".to_string()));
    }
    Ok(keyword)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("user", "u1").is_ok());
        assert!(matches!(validate_id("user", "  "), Err(RecError::InvalidArgument(_))));
        assert!(validate_id("movie", &"x".repeat(300)).is_err());
    }

    #[test]
    fn test_validate_limit() {
        assert_eq!(validate_limit(5, 100).unwrap(), 5);
        assert_eq!(validate_limit(500, 100).unwrap(), 100);
        assert!(validate_limit(0, 100).is_err());
    }

    #[test]
    fn test_validate_keyword() {
        assert_eq!(validate_keyword("  heat ").unwrap(), "heat");
        assert!(validate_keyword("").is_err());
    }
}
