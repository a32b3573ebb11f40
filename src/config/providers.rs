// Builtin chat-completion provider presets
//
// Every preset speaks the OpenAI-compatible `/chat/completions` protocol, so
// switching provider only changes the base URL, the default model and the
// environment variable the credential is read from.

/// A builtin chat-completion provider preset
/// Note: This is hardcoded data, not deserialized from files
#[derive(Debug, Clone)]
pub struct ProviderPreset {
    /// Provider ID (e.g., "groq", "openai")
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Base URL for the API, without the `/chat/completions` suffix
    pub base_url: &'static str,
    /// Model used when none is configured
    pub default_model: &'static str,
    /// Environment variable holding the provider's API key
    pub api_key_env: &'static str,
}

/// Provider used when nothing is configured
pub const DEFAULT_PROVIDER_ID: &str = "groq";

/// Builtin provider presets
pub static PROVIDERS: &[ProviderPreset] = &[
    ProviderPreset {
        id: "groq",
        name: "Groq",
        base_url: "https://api.groq.com/openai/v1",
        default_model: "llama-3.1-8b-instant",
        api_key_env: "GROQ_API_KEY",
    },
    ProviderPreset {
        id: "openai",
        name: "OpenAI",
        base_url: "https://api.openai.com/v1",
        default_model: "gpt-4o-mini",
        api_key_env: "OPENAI_API_KEY",
    },
];

/// Get a provider preset by ID (case-insensitive)
pub fn get_provider_preset(id: &str) -> Option<&'static ProviderPreset> {
    PROVIDERS.iter().find(|p| p.id.eq_ignore_ascii_case(id))
}

/// The preset used when no provider is configured
pub fn default_provider_preset() -> &'static ProviderPreset {
    &PROVIDERS[0]
}
