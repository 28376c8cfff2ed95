use std::env;

/// Retrieves an environment variable, falling back to a default when unset
/// or unparsable.
pub fn get_env_var_or<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Retrieves an environment variable as a string with a default.
pub fn get_env_var_or_string(var: &str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| default.to_string())
}
