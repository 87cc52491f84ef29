//! Configuration validation.

use crate::schema::Config;

/// Validation result.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }
}

/// A validation error.
#[derive(Debug)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// A validation warning.
#[derive(Debug)]
pub struct ValidationWarning {
    pub path: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration.
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_server(config, &mut result);
        Self::validate_telegram(config, &mut result);
        Self::validate_delivery(config, &mut result);

        result
    }

    fn validate_server(config: &Config, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error(ValidationError::new("server.port", "Port cannot be 0"));
        }

        if config.server.host.is_empty() {
            result.add_error(ValidationError::new("server.host", "Host cannot be empty"));
        }
    }

    fn validate_telegram(config: &Config, result: &mut ValidationResult) {
        if config.telegram.token.trim().is_empty() {
            result.add_error(ValidationError::new(
                "telegram.token",
                "Bot token is required (set TELEGRAM_BOT_TOKEN)",
            ));
        }

        if !config.telegram.api_base.starts_with("http://")
            && !config.telegram.api_base.starts_with("https://")
        {
            result.add_error(ValidationError::new(
                "telegram.api_base",
                "api_base must be an http(s) URL",
            ));
        }
    }

    fn validate_delivery(config: &Config, result: &mut ValidationResult) {
        let delivery = &config.delivery;

        if delivery.poll_timeout_secs == 0 {
            result.add_error(ValidationError::new(
                "delivery.poll_timeout_secs",
                "poll_timeout_secs must be greater than 0",
            ));
        }

        if !(1..=100).contains(&delivery.max_connections) {
            result.add_error(ValidationError::new(
                "delivery.max_connections",
                "max_connections must be between 1 and 100",
            ));
        }

        if !delivery.webhook_path.starts_with('/') {
            result.add_error(ValidationError::new(
                "delivery.webhook_path",
                "webhook_path must start with '/'",
            ));
        }

        if delivery.registration_attempts == 0 {
            result.add_error(ValidationError::new(
                "delivery.registration_attempts",
                "registration_attempts must be at least 1",
            ));
        }

        if delivery.poll_limit == 0 || delivery.poll_limit > 100 {
            result.add_warning(ValidationWarning::new(
                "delivery.poll_limit",
                "poll_limit outside 1..=100 is clamped by the platform",
            ));
        }

        for (field, value) in [
            ("delivery.webhook_url", delivery.webhook_url.as_deref()),
            ("delivery.base_url", delivery.base_url.as_deref()),
        ] {
            if let Some(url) = value {
                if !url.starts_with("https://") {
                    result.add_warning(ValidationWarning::new(
                        field,
                        "not an https URL; updates will be delivered by long-polling",
                    ));
                }
            }
        }

        if delivery.secret_token.is_none()
            && (delivery.webhook_url.is_some() || delivery.base_url.is_some())
        {
            result.add_warning(ValidationWarning::new(
                "delivery.secret_token",
                "webhook requests will not be authenticated",
            ));
        }
    }
}
