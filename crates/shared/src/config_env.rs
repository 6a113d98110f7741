use crate::config::ConfigError;

/// Resolves a configuration key to its raw value. `std::env::var` in
/// production, a map in tests.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

pub(crate) fn require_env(lookup: EnvLookup<'_>, key: &str) -> Result<String, ConfigError> {
    optional_trimmed_env(lookup, key).ok_or_else(|| ConfigError::MissingVar(key.to_string()))
}

pub(crate) fn parse_u16_env(
    lookup: EnvLookup<'_>,
    key: &str,
    default: u16,
) -> Result<u16, ConfigError> {
    match optional_trimmed_env(lookup, key) {
        Some(raw) => raw
            .parse::<u16>()
            .map_err(|_| ConfigError::ParseInt(key.to_string())),
        None => Ok(default),
    }
}

pub(crate) fn parse_u64_env(
    lookup: EnvLookup<'_>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match optional_trimmed_env(lookup, key) {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| ConfigError::ParseInt(key.to_string())),
        None => Ok(default),
    }
}

pub(crate) fn parse_bool_env(
    lookup: EnvLookup<'_>,
    key: &str,
    default: bool,
) -> Result<bool, ConfigError> {
    match optional_trimmed_env(lookup, key) {
        Some(raw) => {
            let normalized = raw.to_ascii_lowercase();
            match normalized.as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::ParseBool(key.to_string())),
            }
        }
        None => Ok(default),
    }
}

pub(crate) fn optional_trimmed_env(lookup: EnvLookup<'_>, key: &str) -> Option<String> {
    lookup(key).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
