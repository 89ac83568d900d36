//! Configuration and route file loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::{RouteFile, RouterConfig};
use crate::config::validation::{validate_config, ValidationError};
use crate::routing::{RouteDefinition, SourceError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<RouterConfig, ConfigError> {
    let config: RouterConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RouterConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Parse route definitions from route file text.
pub fn parse_routes(content: &str) -> Result<Vec<RouteDefinition>, SourceError> {
    let file: RouteFile = toml::from_str(content).map_err(|e| SourceError::Parse(e.to_string()))?;
    Ok(file.routes)
}

/// Read route definitions from a TOML route file.
pub fn load_routes(path: &Path) -> Result<Vec<RouteDefinition>, SourceError> {
    let content = fs::read_to_string(path)?;
    parse_routes(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_validates() {
        let err = parse_config("[routing]\npoll_interval_ms = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("poll_interval_ms"));

        let err = parse_config("[routing\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_routes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.toml");
        fs::write(
            &path,
            "[[routes]]\nid = \"r1\"\nbackend = \"https://www.example.org\"\n",
        )
        .unwrap();

        let routes = load_routes(&path).unwrap();
        assert_eq!(routes[0].id, "r1");

        assert!(matches!(
            load_routes(&dir.path().join("missing.toml")),
            Err(SourceError::Io(_))
        ));
        assert!(matches!(
            parse_routes("[[routes]]\nid = 3\n"),
            Err(SourceError::Parse(_))
        ));
    }
}
