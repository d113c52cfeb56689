//! Environment overrides.
//!
//! Platform-style variables decide the listen address; the shared secret can
//! be supplied without writing it to a config file.

use crate::config::schema::GatewayConfig;

/// Host variables, in ascending priority.
pub const HOST_VARS: &[&str] = &["VCAP_APP_HOST", "HOST"];

/// Port variables, in ascending priority.
pub const PORT_VARS: &[&str] = &["VCAP_APP_PORT", "PORT"];

/// Shared secret override.
pub const PASSWORD_VAR: &str = "URLFETCH_PASSWORD";

/// Apply overrides from the process environment.
pub fn apply_env(config: &mut GatewayConfig) {
    apply_env_with(config, |key| std::env::var(key).ok());
}

/// Apply overrides using `lookup` to read variables. Empty values are ignored.
pub fn apply_env_with(config: &mut GatewayConfig, lookup: impl Fn(&str) -> Option<String>) {
    let read = |key: &str| lookup(key).filter(|v| !v.is_empty());
    let last_set = |keys: &[&str]| keys.iter().filter_map(|&k| read(k)).last();

    let host = last_set(HOST_VARS);
    let port = last_set(PORT_VARS);
    if host.is_some() || port.is_some() {
        let (current_host, current_port) = split_address(&config.listener.bind_address);
        let host = host.unwrap_or(current_host);
        let port = port.unwrap_or(current_port);
        config.listener.bind_address = join_address(&host, &port);
        tracing::debug!(bind_address = %config.listener.bind_address, "Listen address from environment");
    }

    if let Some(password) = read(PASSWORD_VAR) {
        config.auth.password = password;
    }
}

fn split_address(address: &str) -> (String, String) {
    match address.rsplit_once(':') {
        Some((host, port)) => (
            host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port.to_string(),
        ),
        None => (address.to_string(), "8080".to_string()),
    }
}

fn join_address(host: &str, port: &str) -> String {
    let host = if host.is_empty() { "0.0.0.0" } else { host };
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}
