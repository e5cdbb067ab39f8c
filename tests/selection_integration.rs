use provider_config::config::ConfigFile;
use provider_config::diagnose::{self, Level};
use provider_config::error::Error;
use provider_config::overrides::ConfigOverride;
use provider_config::provider::WireApi;
use provider_config::selection::{self, CliOverlay};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const FIXTURE: &str = "tests/fixtures/config/config.toml";

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn load(overrides: &[&str], vars: &HashMap<String, String>) -> ConfigFile {
    let overrides: Vec<ConfigOverride> = overrides
        .iter()
        .map(|o| ConfigOverride::parse(o).unwrap())
        .collect();
    ConfigFile::load(Some(Path::new(FIXTURE)), &overrides, vars).unwrap()
}

#[test]
fn config_profile_key_applies_by_default() {
    let vars = env(&[("AZURE_OPENAI_API_KEY", "az-key")]);
    let config = load(&[], &vars);
    let sel = selection::resolve(&config, &CliOverlay::default(), &vars).unwrap();

    assert_eq!(sel.provider_id, "azure");
    assert_eq!(sel.model, "gpt-5-codex");
    assert_eq!(sel.profile.as_deref(), Some("default"));
    assert_eq!(
        sel.provider.wire_endpoint_url().unwrap(),
        "https://acme.openai.azure.com/openai/responses?api-version=2025-04-01-preview"
    );
    assert!(diagnose::diagnose(&sel, &vars).is_empty());
}

#[test]
fn profile_flag_switches_provider_and_model() {
    let vars = env(&[("OPENROUTER_API_KEY", "or-key")]);
    let config = load(&[], &vars);
    let overlay = CliOverlay {
        profile: Some("router".into()),
        ..Default::default()
    };
    let sel = selection::resolve(&config, &overlay, &vars).unwrap();

    assert_eq!(sel.provider_id, "openrouter");
    assert_eq!(sel.model, "anthropic/claude-sonnet-4");
    assert_eq!(sel.provider.request_max_retries(), 8);
    assert_eq!(sel.provider.stream_max_retries(), 5);
    assert_eq!(sel.provider.stream_idle_timeout(), Duration::from_millis(120_000));
}

#[test]
fn override_can_define_and_select_a_provider() {
    let vars = env(&[]);
    let config = load(
        &[
            "model_providers.vllm.name=vLLM",
            "model_providers.vllm.base_url=http://gpu-01:8000/v1",
            "model_providers.vllm.wire_api=responses",
            "profiles.default.model_provider=vllm",
        ],
        &vars,
    );
    let sel = selection::resolve(&config, &CliOverlay::default(), &vars).unwrap();
    assert_eq!(sel.provider_id, "vllm");
    assert_eq!(sel.provider.wire_api, WireApi::Responses);
    assert_eq!(sel.provider.effective_base_url(), "http://gpu-01:8000/v1");
}

#[test]
fn oss_flag_uses_profile_local_provider_and_env_port() {
    let vars = env(&[("CODEX_OSS_PORT", "4321")]);
    let config = load(&[], &vars);
    let overlay = CliOverlay {
        oss: true,
        profile: Some("local".into()),
        ..Default::default()
    };
    let sel = selection::resolve(&config, &overlay, &vars).unwrap();

    assert_eq!(sel.provider_id, "lmstudio");
    assert_eq!(sel.model, "qwen2.5-coder:14b");
    assert_eq!(sel.provider.effective_base_url(), "http://localhost:4321/v1");
    assert_eq!(sel.provider.wire_api, WireApi::Responses);
}

#[test]
fn local_provider_flag_beats_profile() {
    let vars = env(&[("CODEX_OSS_BASE_URL", "http://box:11434/v1")]);
    let config = load(&[], &vars);
    let overlay = CliOverlay {
        local_provider: Some("ollama".into()),
        profile: Some("local".into()),
        model: Some("llama3.1".into()),
        ..Default::default()
    };
    let sel = selection::resolve(&config, &overlay, &vars).unwrap();
    assert_eq!(sel.provider_id, "ollama");
    assert_eq!(sel.model, "llama3.1");
    assert_eq!(sel.provider.effective_base_url(), "http://box:11434/v1");
}

#[test]
fn missing_api_key_is_reported_by_doctor() {
    let vars = env(&[]);
    let config = load(&[], &vars);
    let sel = selection::resolve(&config, &CliOverlay::default(), &vars).unwrap();
    let diags = diagnose::diagnose(&sel, &vars);

    assert_eq!(diags[0].level, Level::Error);
    assert_eq!(diags[0].code, "missing-api-key");
    assert!(diags[0].message.contains("Azure portal"));
}

#[test]
fn proxy_with_endpoint_in_base_url_is_flagged() {
    let vars = env(&[]);
    // The default profile only sets a model, so the top-level provider applies.
    let config = load(&["model_provider=proxy"], &vars);
    let sel = selection::resolve(&config, &CliOverlay::default(), &vars).unwrap();
    assert_eq!(sel.provider_id, "proxy");

    let codes: Vec<_> = diagnose::diagnose(&sel, &vars)
        .iter()
        .map(|d| d.code)
        .collect();
    assert!(codes.contains(&"endpoint-in-base-url"));
    assert!(codes.contains(&"wire-api-mismatch"));
    assert!(!codes.contains(&"missing-api-key"));
}

#[test]
fn unknown_provider_from_override_is_rejected() {
    let vars = env(&[]);
    let config = load(&["profiles.default.model_provider=nowhere"], &vars);
    let err = selection::resolve(&config, &CliOverlay::default(), &vars).unwrap_err();
    match err {
        Error::ProviderNotFound { id, available } => {
            assert_eq!(id, "nowhere");
            assert!(available.contains(&"azure".to_string()));
            assert!(available.contains(&"openai".to_string()));
        }
        other => panic!("expected ProviderNotFound, got {other}"),
    }
}

#[test]
fn bad_override_value_type_is_a_config_error() {
    let overrides = vec![ConfigOverride::parse("model_providers.azure.request_max_retries=many").unwrap()];
    let err = ConfigFile::load(Some(Path::new(FIXTURE)), &overrides, &env(&[])).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
