//! LLM provider registry
//!
//! An immutable table of the providers the console knows how to talk to,
//! built once at startup and shared by reference (or `Arc`) with every
//! component that needs provider or model metadata.

use std::sync::Arc;

use tracing::debug;

/// Wire protocol spoken by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFlavor {
    /// Anthropic Messages API (`/messages`)
    Anthropic,
    /// OpenAI-compatible chat completions (`/chat/completions`)
    OpenAiCompatible,
}

/// Static description of one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provider {
    /// Stable identifier stored in settings (e.g. "anthropic")
    pub id: String,
    /// Human readable name
    pub name: String,
    /// Models offered, in display order
    pub models: Vec<String>,
    /// Model selected when the provider is first chosen
    pub default_model: String,
    /// Environment variable checked for an API key, if the provider needs one
    pub env_key: Option<String>,
    /// Base URL of the API, without a trailing slash
    pub base_url: String,
    /// Protocol used to call the provider
    pub flavor: ApiFlavor,
}

impl Provider {
    fn new(
        id: &str,
        name: &str,
        models: &[&str],
        default_model: &str,
        env_key: Option<&str>,
        base_url: &str,
        flavor: ApiFlavor,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            models: models.iter().map(|m| m.to_string()).collect(),
            default_model: default_model.to_string(),
            env_key: env_key.map(str::to_string),
            base_url: base_url.to_string(),
            flavor,
        }
    }

    /// Whether a credential must be present before calling this provider
    pub fn requires_key(&self) -> bool {
        self.env_key.is_some()
    }

    /// Whether `model` is one of this provider's models
    pub fn has_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }

    /// Index of `model` in the model list, falling back to the default model
    pub fn model_index(&self, model: &str) -> usize {
        self.models
            .iter()
            .position(|m| m == model)
            .or_else(|| self.models.iter().position(|m| *m == self.default_model))
            .unwrap_or(0)
    }
}

/// Immutable, ordered set of providers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRegistry {
    providers: Vec<Provider>,
}

impl ProviderRegistry {
    /// Build a registry from an explicit provider list
    pub fn new(providers: Vec<Provider>) -> Self {
        debug!(count = providers.len(), "ProviderRegistry::new: called");
        Self { providers }
    }

    /// The built-in provider table
    pub fn builtin() -> Self {
        debug!("ProviderRegistry::builtin: called");
        Self::new(vec![
            Provider::new(
                "anthropic",
                "Anthropic",
                &["claude-opus-4-6", "claude-sonnet-4-6", "claude-haiku-4-5-20251001"],
                "claude-sonnet-4-6",
                Some("ANTHROPIC_API_KEY"),
                "https://api.anthropic.com/v1",
                ApiFlavor::Anthropic,
            ),
            Provider::new(
                "openai",
                "OpenAI",
                &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "o1", "o3-mini"],
                "gpt-4o",
                Some("OPENAI_API_KEY"),
                "https://api.openai.com/v1",
                ApiFlavor::OpenAiCompatible,
            ),
            Provider::new(
                "groq",
                "Groq",
                &[
                    "llama-3.3-70b-versatile",
                    "llama-3.1-8b-instant",
                    "mixtral-8x7b-32768",
                    "gemma2-9b-it",
                ],
                "llama-3.3-70b-versatile",
                Some("GROQ_API_KEY"),
                "https://api.groq.com/openai/v1",
                ApiFlavor::OpenAiCompatible,
            ),
            Provider::new(
                "moonshot",
                "Moonshot",
                &[
                    "kimi-k2-0711-preview",
                    "moonshot-v1-8k",
                    "moonshot-v1-32k",
                    "moonshot-v1-128k",
                ],
                "kimi-k2-0711-preview",
                Some("MOONSHOT_API_KEY"),
                "https://api.moonshot.cn/v1",
                ApiFlavor::OpenAiCompatible,
            ),
            Provider::new(
                "ollama",
                "Ollama (local)",
                &[
                    "llama3.3",
                    "llama3.1",
                    "qwen2.5-coder",
                    "mistral",
                    "codellama",
                    "phi4",
                    "gemma3:1b",
                ],
                "llama3.3",
                None,
                "http://localhost:11434/v1",
                ApiFlavor::OpenAiCompatible,
            ),
        ])
    }

    /// Shared handle to the built-in table
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::builtin())
    }

    /// Look up a provider by id
    pub fn get(&self, id: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// Position of a provider in display order
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.providers.iter().position(|p| p.id == id)
    }

    /// Provider at a display position
    pub fn at(&self, index: usize) -> Option<&Provider> {
        self.providers.get(index)
    }

    /// All providers in display order
    pub fn all(&self) -> &[Provider] {
        &self.providers
    }

    /// Provider ids in display order
    pub fn ids(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Default model for a provider id, if the provider exists
    pub fn default_model(&self, id: &str) -> Option<&str> {
        self.get(id).map(|p| p.default_model.as_str())
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
