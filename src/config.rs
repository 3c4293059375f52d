use std::env;
use std::fs;

use thiserror::Error;

/// All settings the archiver needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub nordigen_secret_id: String,
    pub nordigen_secret_key: String,
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub user_email: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "a {readable} should be provided, either in the form of the `{var}` environment \
         variable or in a file whose path is passed via the `{var}_FILE` environment variable"
    )]
    Missing { var: String, readable: String },

    #[error("failed to read `{path}` (from `{var}_FILE`): {source}")]
    Unreadable {
        var: String,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{var}` must be a number, got `{value}`")]
    InvalidNumber { var: String, value: String },
}

/// Read a required setting from `NAME`, or from the file named by `NAME_FILE`
/// (the usual shape for container secrets).
fn read_variable(name: &str, readable: &str) -> Result<String, ConfigError> {
    let var = name.to_uppercase();

    let value = if let Ok(path) = env::var(format!("{var}_FILE")) {
        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Unreadable {
            var: var.clone(),
            path,
            source,
        })?;
        contents.trim_end_matches('\n').to_string()
    } else {
        env::var(&var).unwrap_or_default()
    };

    if value.is_empty() {
        return Err(ConfigError::Missing {
            var,
            readable: readable.to_string(),
        });
    }

    Ok(value)
}

fn read_port(name: &str, readable: &str) -> Result<u16, ConfigError> {
    let value = read_variable(name, readable)?;
    value.parse().map_err(|_| ConfigError::InvalidNumber {
        var: name.to_uppercase(),
        value,
    })
}

pub fn resolve_config() -> Result<Config, ConfigError> {
    Ok(Config {
        nordigen_secret_id: read_variable("nordigen_secret_id", "Nordigen secret ID")?,
        nordigen_secret_key: read_variable("nordigen_secret_key", "Nordigen secret key")?,
        db_host: read_variable("db_host", "DB host")?,
        db_port: read_port("db_port", "DB port")?,
        db_user: read_variable("db_user", "DB user")?,
        db_password: read_variable("db_password", "DB password")?,
        db_name: read_variable("db_name", "DB name")?,
        smtp_host: read_variable("smtp_host", "SMTP host")?,
        smtp_port: read_port("smtp_port", "SMTP port")?,
        smtp_username: read_variable("smtp_username", "SMTP username")?,
        smtp_password: read_variable("smtp_password", "SMTP password")?,
        from_email: read_variable("from_email", "From email")?,
        user_email: read_variable("user_email", "User email")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Environment variables are process-global, so each test uses its own
    // variable names.

    #[test]
    fn test_reads_plain_environment_variable() {
        env::set_var("OBA_TEST_PLAIN", "sekrit");
        assert_eq!(read_variable("oba_test_plain", "test value").unwrap(), "sekrit");
        env::remove_var("OBA_TEST_PLAIN");
    }

    #[test]
    fn test_missing_variable_is_an_error() {
        let err = read_variable("oba_test_absent", "test value").unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));
        assert!(err.to_string().contains("OBA_TEST_ABSENT"));
    }

    #[test]
    fn test_file_variant_wins_and_trailing_newline_is_dropped() {
        let dir = env::temp_dir().join("oba-config-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("secret");
        fs::write(&path, "from-file\n").unwrap();

        env::set_var("OBA_TEST_FILE_FILE", path.to_str().unwrap());
        env::set_var("OBA_TEST_FILE", "from-env");
        assert_eq!(
            read_variable("oba_test_file", "test value").unwrap(),
            "from-file"
        );
        env::remove_var("OBA_TEST_FILE_FILE");
        env::remove_var("OBA_TEST_FILE");
    }

    #[test]
    fn test_port_must_be_numeric() {
        env::set_var("OBA_TEST_PORT", "not-a-port");
        assert!(matches!(
            read_port("oba_test_port", "test port"),
            Err(ConfigError::InvalidNumber { .. })
        ));
        env::remove_var("OBA_TEST_PORT");
    }
}
