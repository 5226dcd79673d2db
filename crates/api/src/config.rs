use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use axum::http::HeaderValue;
use galleryflow_core::derived_cache::DEFAULT_CACHE_CAPACITY;
use galleryflow_core::graph_layout::{DEFAULT_NODE_HEIGHT, DEFAULT_NODE_WIDTH};
use galleryflow_core::{Footprint, LayeredLayout, WorkflowGraphBuilder};
use serde::Deserialize;

/// A configuration value that could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    InvalidValue {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Graph layout settings.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Width given to every node (default: `320`).
    pub node_width: f64,
    /// Height given to every node (default: `140`).
    pub node_height: f64,
    /// Spacing of the layered layout.
    pub layered: LayeredLayout,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: DEFAULT_NODE_WIDTH,
            node_height: DEFAULT_NODE_HEIGHT,
            layered: LayeredLayout::default(),
        }
    }
}

impl LayoutConfig {
    pub fn footprint(&self) -> Footprint {
        Footprint {
            width: self.node_width,
            height: self.node_height,
        }
    }

    pub fn graph_builder(&self) -> WorkflowGraphBuilder {
        WorkflowGraphBuilder::new(self.layered, self.footprint())
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Maximum number of memoized derived views (default: `256`).
    pub cache_capacity: usize,
    pub layout: LayoutConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `CACHE_CAPACITY`       | `256`                      |
    /// | `LAYOUT_CONFIG`        | unset (JSON `LayoutConfig`) |
    /// | `LAYOUT_NODE_WIDTH`    | `320`                      |
    /// | `LAYOUT_NODE_HEIGHT`   | `140`                      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        if host.parse::<IpAddr>().is_err() {
            return Err(invalid("HOST", host, "an IP address"));
        }

        let port = parse_var(&lookup, "PORT", 3000u16, "a valid u16")?;

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if let Some(bad) = cors_origins
            .iter()
            .find(|origin| HeaderValue::from_str(origin).is_err())
        {
            return Err(invalid("CORS_ORIGINS", bad.clone(), "a list of valid origins"));
        }

        let request_timeout_secs =
            parse_var(&lookup, "REQUEST_TIMEOUT_SECS", 30u64, "a valid u64")?;
        let cache_capacity = parse_var(
            &lookup,
            "CACHE_CAPACITY",
            DEFAULT_CACHE_CAPACITY,
            "a valid usize",
        )?;

        let base = parse_layout_config(&lookup)?;
        let layout = LayoutConfig {
            node_width: parse_dimension(&lookup, "LAYOUT_NODE_WIDTH", base.node_width)?,
            node_height: parse_dimension(&lookup, "LAYOUT_NODE_HEIGHT", base.node_height)?,
            ..base
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            cache_capacity,
            layout,
        })
    }

    /// Address the server binds to.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = self
            .host
            .parse::<IpAddr>()
            .map_err(|_| invalid("HOST", self.host.clone(), "an IP address"))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn invalid(var: &'static str, value: String, expected: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        var,
        value,
        expected,
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match lookup(var) {
        Some(raw) => raw.trim().parse().map_err(|_| invalid(var, raw, expected)),
        None => Ok(default),
    }
}

/// `LAYOUT_CONFIG` holds a JSON [`LayoutConfig`]; missing fields take
/// their defaults.
fn parse_layout_config(
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<LayoutConfig, ConfigError> {
    const EXPECTED: &str = "a JSON layout object with positive sizes";

    let Some(raw) = lookup("LAYOUT_CONFIG") else {
        return Ok(LayoutConfig::default());
    };
    let layout: LayoutConfig =
        serde_json::from_str(&raw).map_err(|_| invalid("LAYOUT_CONFIG", raw.clone(), EXPECTED))?;

    let sizes = [
        layout.node_width,
        layout.node_height,
        layout.layered.node_sep,
        layout.layered.rank_sep,
    ];
    let usable = sizes[..2].iter().all(|v| v.is_finite() && *v > 0.0)
        && sizes[2..].iter().all(|v| v.is_finite() && *v >= 0.0);
    if usable {
        Ok(layout)
    } else {
        Err(invalid("LAYOUT_CONFIG", raw, EXPECTED))
    }
}

fn parse_dimension(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: f64,
) -> Result<f64, ConfigError> {
    let value = parse_var(lookup, var, default, "a positive number")?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(invalid(var, value.to_string(), "a positive number"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_without_variables() {
        let config = load(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.cache_capacity, 256);
        assert_eq!(config.layout, LayoutConfig::default());
        assert_eq!(config.layout.footprint(), Footprint::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("PORT", "8080"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,"),
            ("CACHE_CAPACITY", "0"),
            ("LAYOUT_NODE_WIDTH", "200.5"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.cache_capacity, 0);
        assert_eq!(config.layout.node_width, 200.5);
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
    }

    #[test]
    fn invalid_port_is_rejected() {
        assert_matches!(
            load(&[("PORT", "http")]),
            Err(ConfigError::InvalidValue { var: "PORT", .. })
        );
    }

    #[test]
    fn invalid_host_is_rejected() {
        assert_matches!(
            load(&[("HOST", "not an ip")]),
            Err(ConfigError::InvalidValue { var: "HOST", .. })
        );
    }

    #[test]
    fn non_positive_dimensions_are_rejected() {
        assert_matches!(
            load(&[("LAYOUT_NODE_HEIGHT", "0")]),
            Err(ConfigError::InvalidValue { var: "LAYOUT_NODE_HEIGHT", .. })
        );
        assert_matches!(
            load(&[("LAYOUT_NODE_WIDTH", "NaN")]),
            Err(ConfigError::InvalidValue { var: "LAYOUT_NODE_WIDTH", .. })
        );
    }

    #[test]
    fn layout_config_variable_is_loaded() {
        let config = load(&[(
            "LAYOUT_CONFIG",
            r#"{ "node_width": 100, "layered": { "rank_sep": 80 } }"#,
        )])
        .unwrap();
        assert_eq!(config.layout.node_width, 100.0);
        assert_eq!(config.layout.node_height, DEFAULT_NODE_HEIGHT);
        assert_eq!(config.layout.layered.rank_sep, 80.0);
        assert_eq!(config.layout.layered.node_sep, LayeredLayout::default().node_sep);
    }

    #[test]
    fn dimension_variables_override_layout_config() {
        let config = load(&[
            ("LAYOUT_CONFIG", r#"{ "node_width": 100, "node_height": 60 }"#),
            ("LAYOUT_NODE_WIDTH", "250"),
        ])
        .unwrap();
        assert_eq!(config.layout.node_width, 250.0);
        assert_eq!(config.layout.node_height, 60.0);
    }

    #[test]
    fn malformed_layout_config_is_rejected() {
        assert_matches!(
            load(&[("LAYOUT_CONFIG", "{ node_width: 1")]),
            Err(ConfigError::InvalidValue { var: "LAYOUT_CONFIG", .. })
        );
        assert_matches!(
            load(&[("LAYOUT_CONFIG", r#"{ "node_height": -5 }"#)]),
            Err(ConfigError::InvalidValue { var: "LAYOUT_CONFIG", .. })
        );
    }
}
