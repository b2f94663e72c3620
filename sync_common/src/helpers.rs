use std::{env, time::Duration};

use log::*;

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

/// Reads the boolean environment variable `name`, falling back to `default` when it is unset or unparseable.
pub fn parse_env_flag(name: &str, default: bool) -> bool {
    parse_boolean_flag(env::var(name).ok(), default)
}

/// Reads a duration, expressed in whole seconds, from the environment variable `name`.
pub fn parse_env_seconds(name: &str, default: Duration) -> Duration {
    match env::var(name) {
        Ok(s) => s.trim().parse::<u64>().map(Duration::from_secs).unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {name} ({s}). {e}. Using {}s instead.", default.as_secs());
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default value of {}s.", default.as_secs());
            default
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn boolean_flags() {
        assert!(parse_boolean_flag(Some(" Yes ".into()), false));
        assert!(!parse_boolean_flag(Some("off".into()), true));
        assert!(parse_boolean_flag(Some("maybe".into()), true));
        assert!(!parse_boolean_flag(None, false));
    }

    #[test]
    fn seconds_fall_back_to_default() {
        let d = parse_env_seconds("OSYNC_TEST_UNSET_SECONDS_VARIABLE", Duration::from_secs(42));
        assert_eq!(d, Duration::from_secs(42));
    }
}
