use thiserror::Error;

/// Failures raised while standing the service up or keeping its
/// infrastructure alive. Read-path degradation never lands here; that is
/// `RepoError` territory.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("listener error: {0}")]
    Listener(#[from] std::io::Error),
    #[error("database unavailable: {message}")]
    Database { message: String },
    #[error("telemetry setup failed: {0}")]
    Telemetry(String),
    #[error("invalid deployment configuration: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_concern() {
        let bind = InfraError::from(std::io::Error::other("address in use"));
        assert!(bind.to_string().starts_with("listener error"));

        let config = InfraError::configuration("database.url is required");
        assert_eq!(
            config.to_string(),
            "invalid deployment configuration: database.url is required"
        );

        let db = InfraError::database("connection refused");
        assert!(db.to_string().contains("connection refused"));
    }
}
