//! Provider registry and credential resolution.
//!
//! Providers are loaded once from `tool_config.json`; credentials come
//! from `.tool_credentials.json` or `<PROVIDER>_<FIELD>` environment
//! variables. Both files are read-only at query time; the CLI mutates
//! them out of band. Credentials never appear in version control.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ToolCategory;
use crate::error::QaError;

/// Provider id used when nothing better is configured. Requires no
/// credentials.
pub const GENERIC_PROVIDER: &str = "web_search_generic";

/// Configuration of one external data provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Knowledge category this provider serves.
    pub category: ToolCategory,
    /// URL template with `{q}` and credential-field placeholders.
    #[serde(default)]
    pub endpoint_template: String,
    /// Credential fields the provider requires.
    #[serde(default)]
    pub required_fields: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolConfigFile {
    #[serde(default)]
    providers: BTreeMap<String, ProviderConfig>,
}

/// Credentials for one provider: field name to value.
pub type Credentials = BTreeMap<String, String>;

/// Registry of configured providers plus credential lookup.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    providers: BTreeMap<String, ProviderConfig>,
    credentials_path: PathBuf,
}

impl ToolRegistry {
    /// Loads the registry from a config file. A missing or malformed
    /// file yields an empty registry rather than an error, so the
    /// pipeline degrades to the generic provider.
    #[must_use]
    pub fn load(config_path: &Path, credentials_path: &Path) -> Self {
        let providers = std::fs::read_to_string(config_path)
            .ok()
            .and_then(|raw| serde_json::from_str::<ToolConfigFile>(&raw).ok())
            .map(|f| f.providers)
            .unwrap_or_default();

        Self {
            providers,
            credentials_path: credentials_path.to_path_buf(),
        }
    }

    /// Builds a registry from already-parsed providers.
    #[must_use]
    pub fn from_providers(
        providers: BTreeMap<String, ProviderConfig>,
        credentials_path: PathBuf,
    ) -> Self {
        Self {
            providers,
            credentials_path,
        }
    }

    /// Configured provider ids.
    #[must_use]
    pub fn provider_ids(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    /// Looks up one provider's configuration.
    #[must_use]
    pub fn get(&self, provider_id: &str) -> Option<&ProviderConfig> {
        self.providers.get(provider_id)
    }

    /// Configured providers serving the given category.
    #[must_use]
    pub fn providers_for_category(&self, category: ToolCategory) -> Vec<&str> {
        self.providers
            .iter()
            .filter(|(_, p)| p.category == category)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Resolves credentials for a provider from the credentials file,
    /// then from `<PROVIDER>_<FIELD>` environment variables. Returns
    /// `None` unless every required field is satisfied.
    #[must_use]
    pub fn resolve_credentials(&self, provider_id: &str, required: &[String]) -> Option<Credentials> {
        if required.is_empty() {
            return Some(Credentials::new());
        }

        if let Some(creds) = self.stored_credentials(provider_id) {
            if required.iter().all(|f| creds.get(f).is_some_and(|v| !v.is_empty())) {
                return Some(creds);
            }
        }

        let env_prefix = provider_id.to_uppercase().replace('-', "_");
        let mut env_creds = Credentials::new();
        for field in required {
            let key = format!("{env_prefix}_{}", field.to_uppercase());
            if let Ok(value) = std::env::var(&key) {
                env_creds.insert(field.clone(), value);
            }
        }
        (env_creds.len() == required.len()).then_some(env_creds)
    }

    fn stored_credentials(&self, provider_id: &str) -> Option<Credentials> {
        let raw = std::fs::read_to_string(&self.credentials_path).ok()?;
        let store: BTreeMap<String, Credentials> = serde_json::from_str(&raw).ok()?;
        store.get(provider_id).cloned()
    }

    /// Persists credentials for a provider, merging into the existing
    /// store with an atomic temp-file rename.
    ///
    /// # Errors
    ///
    /// Returns [`QaError::Memory`] when the store cannot be written.
    pub fn register_credentials(
        &self,
        provider_id: &str,
        credentials: Credentials,
    ) -> Result<(), QaError> {
        let mut store: BTreeMap<String, Credentials> = std::fs::read_to_string(&self.credentials_path)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();

        store.insert(provider_id.to_string(), credentials);

        let serialized = serde_json::to_string_pretty(&store).map_err(|e| QaError::Memory {
            message: format!("credential serialization failed: {e}"),
        })?;

        let tmp = self.credentials_path.with_extension("json.tmp");
        std::fs::write(&tmp, serialized).map_err(|e| QaError::Memory {
            message: format!("credential write failed: {e}"),
        })?;
        std::fs::rename(&tmp, &self.credentials_path).map_err(|e| QaError::Memory {
            message: format!("credential rename failed: {e}"),
        })?;
        Ok(())
    }
}

/// Outcome of the credential handshake.
#[derive(Debug, Clone, Default)]
pub struct ResolvedProviders {
    /// Providers ready to execute.
    pub ready: Vec<String>,
    /// Providers the operator skipped or that lack credentials.
    pub skipped: Vec<String>,
}

/// Operator-facing credential acquisition.
///
/// The interactive CLI implements this over stdin; evaluation and
/// library use pass [`NoPrompt`] so unconfigured providers are skipped.
pub trait CredentialPrompt: Send + Sync {
    /// Requests credentials for a provider. Returning `None` means the
    /// operator skipped the provider.
    fn request(
        &self,
        provider_id: &str,
        category: ToolCategory,
        required_fields: &[String],
    ) -> Option<Credentials>;
}

/// Non-interactive prompt: every unconfigured provider is skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

impl CredentialPrompt for NoPrompt {
    fn request(
        &self,
        _provider_id: &str,
        _category: ToolCategory,
        _required_fields: &[String],
    ) -> Option<Credentials> {
        None
    }
}

/// Parses an operator credential payload: either a JSON object or
/// comma-separated `key=value` pairs. Returns `None` for the literal
/// `SKIP` or anything that does not satisfy the required fields.
#[must_use]
pub fn parse_credential_payload(input: &str, required: &[String]) -> Option<Credentials> {
    let input = input.trim();
    if input.is_empty() || input.eq_ignore_ascii_case("skip") {
        return None;
    }

    if let Ok(parsed) = serde_json::from_str::<Credentials>(input) {
        if required.iter().all(|f| parsed.get(f).is_some_and(|v| !v.is_empty())) {
            return Some(parsed);
        }
    }

    let mut creds = Credentials::new();
    for part in input.split(',') {
        if let Some((k, v)) = part.split_once('=') {
            creds.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    required
        .iter()
        .all(|f| creds.get(f).is_some_and(|v| !v.is_empty()))
        .then_some(creds)
}

/// Runs the credential handshake for the planner's recommendations.
///
/// Each recommended provider is ready if configured with all required
/// fields satisfied; otherwise the prompt is consulted (and any supplied
/// credentials persisted). If every recommendation ends up skipped, the
/// generic provider is substituted so the search can still proceed.
pub fn resolve_providers(
    registry: &ToolRegistry,
    prompt: &dyn CredentialPrompt,
    recommended: &[String],
    category: ToolCategory,
) -> ResolvedProviders {
    let mut resolved = ResolvedProviders::default();

    for provider in recommended {
        if provider == GENERIC_PROVIDER {
            resolved.ready.push(provider.clone());
            continue;
        }

        let Some(config) = registry.get(provider) else {
            tracing::debug!(provider = %provider, "recommended provider not configured");
            match prompt.request(provider, category, &[]) {
                Some(_) => resolved.ready.push(provider.clone()),
                None => resolved.skipped.push(provider.clone()),
            }
            continue;
        };

        if registry
            .resolve_credentials(provider, &config.required_fields)
            .is_some()
        {
            resolved.ready.push(provider.clone());
            continue;
        }

        match prompt.request(provider, category, &config.required_fields) {
            Some(creds) => {
                if let Err(e) = registry.register_credentials(provider, creds) {
                    tracing::warn!(provider = %provider, error = %e, "failed to persist credentials");
                }
                resolved.ready.push(provider.clone());
            }
            None => resolved.skipped.push(provider.clone()),
        }
    }

    if resolved.ready.is_empty() {
        resolved.ready.push(GENERIC_PROVIDER.to_string());
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(providers: &[(&str, ToolCategory, &[&str])]) -> ToolRegistry {
        let map = providers
            .iter()
            .map(|(id, cat, fields)| {
                (
                    (*id).to_string(),
                    ProviderConfig {
                        category: *cat,
                        endpoint_template: String::new(),
                        required_fields: fields.iter().map(ToString::to_string).collect(),
                    },
                )
            })
            .collect();
        ToolRegistry::from_providers(map, PathBuf::from("/nonexistent/creds.json"))
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let registry = ToolRegistry::load(
            Path::new("/nonexistent/tool_config.json"),
            Path::new("/nonexistent/creds.json"),
        );
        assert!(registry.provider_ids().is_empty());
    }

    #[test]
    fn test_providers_for_category() {
        let registry = registry_with(&[
            ("serpapi", ToolCategory::Generic, &["api_key"]),
            ("edgar", ToolCategory::Regulatory, &[]),
        ]);
        assert_eq!(
            registry.providers_for_category(ToolCategory::Regulatory),
            vec!["edgar"]
        );
    }

    #[test]
    fn test_resolve_credentials_from_env() {
        let registry = registry_with(&[("acme-data", ToolCategory::Financials, &["api_key"])]);
        // Unique env var name to avoid cross-test interference.
        std::env::set_var("ACME_DATA_API_KEY", "sekrit");
        let creds = registry.resolve_credentials("acme-data", &["api_key".to_string()]);
        std::env::remove_var("ACME_DATA_API_KEY");
        assert_eq!(creds.and_then(|c| c.get("api_key").cloned()).as_deref(), Some("sekrit"));
    }

    #[test]
    fn test_resolve_credentials_missing() {
        let registry = registry_with(&[("serpapi", ToolCategory::Generic, &["api_key"])]);
        assert!(registry
            .resolve_credentials("serpapi", &["api_key".to_string()])
            .is_none());
    }

    #[test]
    fn test_parse_credential_payload_json() {
        let creds = parse_credential_payload(r#"{"api_key": "xxx"}"#, &["api_key".to_string()]);
        assert_eq!(creds.and_then(|c| c.get("api_key").cloned()).as_deref(), Some("xxx"));
    }

    #[test]
    fn test_parse_credential_payload_key_value() {
        let creds = parse_credential_payload("api_key=xxx, region=us", &["api_key".to_string()]);
        assert_eq!(creds.and_then(|c| c.get("api_key").cloned()).as_deref(), Some("xxx"));
    }

    #[test]
    fn test_parse_credential_payload_skip() {
        assert!(parse_credential_payload("SKIP", &["api_key".to_string()]).is_none());
        assert!(parse_credential_payload("skip", &["api_key".to_string()]).is_none());
    }

    #[test]
    fn test_parse_credential_payload_incomplete() {
        assert!(parse_credential_payload("region=us", &["api_key".to_string()]).is_none());
    }

    #[test]
    fn test_handshake_all_skipped_falls_back_to_generic() {
        let registry = registry_with(&[("serpapi", ToolCategory::Generic, &["api_key"])]);
        let resolved = resolve_providers(
            &registry,
            &NoPrompt,
            &["serpapi".to_string()],
            ToolCategory::Generic,
        );
        assert_eq!(resolved.skipped, vec!["serpapi"]);
        assert_eq!(resolved.ready, vec![GENERIC_PROVIDER]);
    }

    #[test]
    fn test_handshake_generic_always_ready() {
        let registry = ToolRegistry::default();
        let resolved = resolve_providers(
            &registry,
            &NoPrompt,
            &[GENERIC_PROVIDER.to_string()],
            ToolCategory::Generic,
        );
        assert_eq!(resolved.ready, vec![GENERIC_PROVIDER]);
        assert!(resolved.skipped.is_empty());
    }

    #[test]
    fn test_handshake_ready_when_no_fields_required() {
        let registry = registry_with(&[("edgar", ToolCategory::Regulatory, &[])]);
        let resolved = resolve_providers(
            &registry,
            &NoPrompt,
            &["edgar".to_string()],
            ToolCategory::Regulatory,
        );
        assert_eq!(resolved.ready, vec!["edgar"]);
    }
}
