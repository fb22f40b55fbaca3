use std::time::Duration;

use crate::domain::FetchError;

/// Reads `name`, treating unset and blank values alike. Values are trimmed.
pub(crate) fn read_env_var(name: &str) -> Result<Option<String>, FetchError> {
    let value = match std::env::var(name) {
        Ok(value) => value,
        Err(std::env::VarError::NotPresent) => return Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => {
            return Err(FetchError::config(format!("{name} is not valid UTF-8")));
        }
    };

    let value = value.trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}

/// Returns the value of the first variable in `names` that holds something.
pub(crate) fn read_first_env_var(names: &[&str]) -> Result<Option<String>, FetchError> {
    for name in names {
        if let Some(value) = read_env_var(name)? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

pub(crate) fn parse_timeout_secs(name: &str, raw: &str) -> Result<Duration, FetchError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(FetchError::config(format!(
            "{name} must be at least 1 second"
        ))),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(_) => Err(FetchError::config(format!(
            "{name} must be a whole number of seconds, got '{}'",
            raw.trim()
        ))),
    }
}

pub(crate) fn read_timeout_from_env(name: &str) -> Result<Option<Duration>, FetchError> {
    read_env_var(name)?
        .map(|raw| parse_timeout_secs(name, &raw))
        .transpose()
}
