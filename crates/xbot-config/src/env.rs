//! Environment overrides for secrets and deployment knobs.

use crate::{ConfigError, XbotConfig};
use log::debug;

/// API key for the text endpoint.
pub const ENV_OPENAI_API_KEY: &str = "XBOT_OPENAI_API_KEY";
/// API key for the image endpoint.
pub const ENV_IMAGE_API_KEY: &str = "XBOT_IMAGE_API_KEY";
/// Object store access key id.
pub const ENV_S3_ACCESS_KEY: &str = "XBOT_S3_ACCESS_KEY";
/// Object store secret key.
pub const ENV_S3_SECRET_KEY: &str = "XBOT_S3_SECRET_KEY";
/// MongoDB connection string.
pub const ENV_MONGO_URI: &str = "XBOT_MONGO_URI";
/// Message storage mode.
pub const ENV_MESSAGE_STORAGE: &str = "XBOT_MESSAGE_STORAGE";
/// HTTP listener port.
pub const ENV_PORT: &str = "XBOT_PORT";

impl XbotConfig {
    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_env_overrides_with(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Empty values are ignored so an unset secret never clears a file value.
    pub fn apply_env_overrides_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let string_overrides: [(&str, &mut String); 6] = [
            (ENV_OPENAI_API_KEY, &mut self.ai.text.api_key),
            (ENV_IMAGE_API_KEY, &mut self.ai.image.api_key),
            (ENV_S3_ACCESS_KEY, &mut self.storage.s3.access_key),
            (ENV_S3_SECRET_KEY, &mut self.storage.s3.secret_key),
            (ENV_MONGO_URI, &mut self.storage.mongo.uri),
            (ENV_MESSAGE_STORAGE, &mut self.storage.message_storage),
        ];
        for (name, slot) in string_overrides {
            if let Some(value) = get(name) {
                debug!("applied environment override (name={})", name);
                *slot = value;
            }
        }
        if let Some(value) = get(ENV_PORT) {
            self.server.port = value.trim().parse().map_err(|err| ConfigError::InvalidEnv {
                name: ENV_PORT.to_string(),
                message: format!("{err}"),
            })?;
            debug!("applied environment override (name={})", ENV_PORT);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ENV_OPENAI_API_KEY, ENV_PORT, ENV_S3_SECRET_KEY};
    use crate::{ConfigError, XbotConfig};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn secrets_override_file_values() {
        let mut config = XbotConfig::default();
        config.storage.s3.secret_key = "from-file".to_string();
        config
            .apply_env_overrides_with(lookup(&[
                (ENV_OPENAI_API_KEY, "sk-env"),
                (ENV_S3_SECRET_KEY, ""),
                (ENV_PORT, "9090"),
            ]))
            .expect("overrides");
        assert_eq!(config.ai.text.api_key, "sk-env");
        assert_eq!(config.storage.s3.secret_key, "from-file");
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn malformed_port_is_rejected() {
        let mut config = XbotConfig::default();
        let err = config
            .apply_env_overrides_with(lookup(&[(ENV_PORT, "eighty")]))
            .expect_err("bad port");
        assert!(matches!(err, ConfigError::InvalidEnv { ref name, .. } if name == ENV_PORT));
    }
}
