use anyhow::{anyhow, Context};
use std::time::Duration;

use crate::{error::AutofillError, models::{ProviderKind, SchemaVersion}};

pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are an expert product description writer. Create engaging and concise product descriptions. Do not include prices in the description.";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_OPENAI_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4";
pub const DEFAULT_GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub model: String,
}

/// Everything the admin configuration screen controls.
#[derive(Debug, Clone)]
pub struct AutofillSettings {
    pub enabled: bool,
    pub provider: ProviderKind,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub system_message: Option<String>,
    pub schema_version: SchemaVersion,
    pub timeout: Duration,
    pub openai: ProviderEndpoint,
    pub gemini: ProviderEndpoint,
}

impl Default for AutofillSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: ProviderKind::OpenAi,
            openai_api_key: None,
            gemini_api_key: None,
            system_message: None,
            schema_version: SchemaVersion::Structured,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            openai: ProviderEndpoint { base_url: DEFAULT_OPENAI_BASE.into(), model: DEFAULT_OPENAI_MODEL.into() },
            gemini: ProviderEndpoint { base_url: DEFAULT_GEMINI_BASE.into(), model: DEFAULT_GEMINI_MODEL.into() },
        }
    }
}

impl AutofillSettings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key/value source; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut s = Self::default();
        if let Some(v) = lookup("AUTOFILL_ENABLED") {
            s.enabled = parse_flag(&v).ok_or_else(|| anyhow!("invalid AUTOFILL_ENABLED value: {v}"))?;
        }
        if let Some(v) = lookup("AUTOFILL_API_PROVIDER") {
            s.provider = v.parse().map_err(|e: String| anyhow!(e))?;
        }
        if let Some(v) = lookup("AUTOFILL_SCHEMA") {
            s.schema_version = v.parse().map_err(|e: String| anyhow!(e))?;
        }
        if let Some(v) = lookup("AUTOFILL_HTTP_TIMEOUT_SECS") {
            let secs: u64 = v.trim().parse().with_context(|| format!("invalid AUTOFILL_HTTP_TIMEOUT_SECS value: {v}"))?;
            s.timeout = Duration::from_secs(secs);
        }
        s.openai_api_key = lookup("OPENAI_API_KEY");
        s.gemini_api_key = lookup("GEMINI_API_KEY");
        s.system_message = lookup("AUTOFILL_SYSTEM_MESSAGE");
        if let Some(v) = lookup("OPENAI_API_BASE") { s.openai.base_url = v; }
        if let Some(v) = lookup("OPENAI_MODEL") { s.openai.model = v; }
        if let Some(v) = lookup("GEMINI_API_BASE") { s.gemini.base_url = v; }
        if let Some(v) = lookup("GEMINI_MODEL") { s.gemini.model = v; }
        Ok(s)
    }

    pub fn api_key(&self, provider: ProviderKind) -> Option<&str> {
        let key = match provider {
            ProviderKind::OpenAi => self.openai_api_key.as_deref(),
            ProviderKind::Gemini => self.gemini_api_key.as_deref(),
        };
        key.map(str::trim).filter(|k| !k.is_empty())
    }

    /// Checks the enabled flag and the selected provider's key before any call is made.
    pub fn provider_config(&self) -> Result<ProviderConfig, AutofillError> {
        if !self.enabled {
            return Err(AutofillError::FeatureDisabled);
        }
        let api_key = self.api_key(self.provider).ok_or(AutofillError::MissingApiKey(self.provider))?;
        let endpoint = match self.provider {
            ProviderKind::OpenAi => self.openai.clone(),
            ProviderKind::Gemini => self.gemini.clone(),
        };
        Ok(ProviderConfig {
            provider: self.provider,
            api_key: api_key.to_string(),
            system_message: self.system_message.clone().filter(|m| !m.trim().is_empty()),
            schema_version: self.schema_version,
            endpoint,
            timeout: self.timeout,
        })
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Settings for one call. Only obtainable through [`AutofillSettings::provider_config`],
/// so the API key is always non-empty.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    api_key: String,
    pub system_message: Option<String>,
    pub schema_version: SchemaVersion,
    pub endpoint: ProviderEndpoint,
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn api_key(&self) -> &str { &self.api_key }

    pub fn system_message(&self) -> &str {
        self.system_message.as_deref().unwrap_or(DEFAULT_SYSTEM_MESSAGE)
    }
}

/// Read access to the current settings, injected into the service so tests can pin values.
pub trait SettingsSource: Send + Sync {
    fn settings(&self) -> AutofillSettings;
}

impl SettingsSource for AutofillSettings {
    fn settings(&self) -> AutofillSettings { self.clone() }
}
