/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Parse an integer configuration value, falling back to the default when unset or malformed.
pub fn parse_int_value(value: Option<String>, default: i64) -> i64 {
    value.and_then(|v| v.trim().parse::<i64>().ok()).unwrap_or(default)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn boolean_flags() {
        assert!(parse_boolean_flag(Some("1".into()), false));
        assert!(parse_boolean_flag(Some(" Yes ".into()), false));
        assert!(!parse_boolean_flag(Some("off".into()), true));
        assert!(parse_boolean_flag(None, true));
        assert!(!parse_boolean_flag(Some("banana".into()), false));
    }

    #[test]
    fn int_values() {
        assert_eq!(parse_int_value(Some("42".into()), 7), 42);
        assert_eq!(parse_int_value(Some("not a number".into()), 7), 7);
        assert_eq!(parse_int_value(None, 7), 7);
    }
}
