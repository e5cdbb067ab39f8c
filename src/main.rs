use anyhow::Result;
use clap::Parser;
use provider_config::config::ConfigFile;
use provider_config::diagnose::{self, Diagnostic};
use provider_config::docs;
use provider_config::env::{Env, ProcessEnv};
use provider_config::http::ProviderClient;
use provider_config::overrides::ConfigOverride;
use provider_config::provider::ModelProviderInfo;
use provider_config::registry::ProviderRegistry;
use provider_config::selection::{self, CliOverlay, Selection};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "provider-config",
    version,
    about = "Resolve and check the model provider an agent CLI would use"
)]
struct Cli {
    /// Config file (default: $CODEX_HOME/config.toml or ~/.codex/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<PathBuf>,

    /// Use a local open-source provider
    #[arg(long, global = true)]
    oss: bool,

    /// Local provider for --oss: ollama or lmstudio
    #[arg(long, global = true, value_name = "NAME")]
    local_provider: Option<String>,

    /// Model override
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Config override, e.g. -c model_providers.azure.wire_api=responses (repeatable)
    #[arg(short = 'c', long = "config", global = true, value_name = "KEY=VALUE", value_parser = parse_override)]
    overrides: Vec<ConfigOverride>,

    /// Config profile to apply
    #[arg(short, long, global = true)]
    profile: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Print the resolved provider and model
    Show {
        #[arg(long)]
        json: bool,
    },

    /// List every registered provider
    Providers {
        #[arg(long)]
        json: bool,
    },

    /// Check the resolved provider for common misconfigurations
    Doctor {
        #[arg(long)]
        json: bool,
    },

    /// Query the provider's /models endpoint
    Models,

    /// Check that every ```toml block in markdown docs is a valid config
    LintDocs {
        /// Markdown file or directory
        path: PathBuf,

        #[arg(long)]
        json: bool,
    },
}

fn parse_override(raw: &str) -> std::result::Result<ConfigOverride, String> {
    ConfigOverride::parse(raw).map_err(|e| e.to_string())
}

#[derive(Serialize)]
struct SelectionReport {
    provider_id: String,
    provider_name: String,
    model: String,
    profile: Option<String>,
    oss: bool,
    wire_api: String,
    base_url: String,
    endpoint: String,
    request_max_retries: u64,
    stream_max_retries: u64,
    stream_idle_timeout_ms: u64,
    credential: String,
    headers: Vec<String>,
}

impl SelectionReport {
    fn new(selection: &Selection, env: &dyn Env) -> Result<Self> {
        let provider = &selection.provider;
        let credential = match provider.credential(env) {
            Ok(Some(cred)) => cred.source.to_string(),
            Ok(None) => "none".into(),
            Err(e) => format!("unavailable ({e})"),
        };
        Ok(Self {
            provider_id: selection.provider_id.clone(),
            provider_name: provider.name.clone(),
            model: selection.model.clone(),
            profile: selection.profile.clone(),
            oss: selection.oss,
            wire_api: provider.wire_api.to_string(),
            base_url: provider.effective_base_url(),
            endpoint: provider.wire_endpoint_url()?,
            request_max_retries: provider.request_max_retries(),
            stream_max_retries: provider.stream_max_retries(),
            stream_idle_timeout_ms: provider.stream_idle_timeout().as_millis() as u64,
            credential,
            headers: provider
                .headers(env)
                .keys()
                .map(|k| k.as_str().to_string())
                .collect(),
        })
    }

    fn print(&self) {
        println!("provider:     {} ({})", self.provider_id, self.provider_name);
        println!("model:        {}", self.model);
        if let Some(profile) = &self.profile {
            println!("profile:      {profile}");
        }
        if self.oss {
            println!("mode:         oss");
        }
        println!("wire_api:     {}", self.wire_api);
        println!("base_url:     {}", self.base_url);
        println!("endpoint:     {}", self.endpoint);
        println!(
            "retries:      request={} stream={}",
            self.request_max_retries, self.stream_max_retries
        );
        println!("idle timeout: {}ms", self.stream_idle_timeout_ms);
        println!("credential:   {}", self.credential);
        if !self.headers.is_empty() {
            println!("headers:      {}", self.headers.join(", "));
        }
    }
}

#[derive(Serialize)]
struct ProviderRow<'a> {
    id: &'a str,
    name: &'a str,
    base_url: String,
    wire_api: String,
    env_key: Option<&'a str>,
    requires_openai_auth: bool,
}

impl<'a> ProviderRow<'a> {
    fn new(id: &'a str, p: &'a ModelProviderInfo) -> Self {
        Self {
            id,
            name: &p.name,
            base_url: p.effective_base_url(),
            wire_api: p.wire_api.to_string(),
            env_key: p.env_key.as_deref(),
            requires_openai_auth: p.requires_openai_auth,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("provider_config=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let env = ProcessEnv;

    let load = || -> Result<(ConfigFile, CliOverlay)> {
        let config = ConfigFile::load(cli.config_file.as_deref(), &cli.overrides, &env)?;
        let overlay = CliOverlay {
            oss: cli.oss,
            local_provider: cli.local_provider.clone(),
            model: cli.model.clone(),
            profile: cli.profile.clone(),
        };
        Ok((config, overlay))
    };

    match cli.command {
        Command::Show { json } => {
            let (config, overlay) = load()?;
            let selection = selection::resolve(&config, &overlay, &env)?;
            let report = SelectionReport::new(&selection, &env)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                report.print();
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Providers { json } => {
            let (config, _) = load()?;
            let registry = ProviderRegistry::from_config(&config, &env)?;
            let rows: Vec<ProviderRow> = registry
                .iter()
                .map(|(id, p)| ProviderRow::new(id, p))
                .collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                for row in &rows {
                    println!(
                        "{:<12} {:<10} {:<9} {}",
                        row.id, row.name, row.wire_api, row.base_url
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Doctor { json } => {
            let (config, overlay) = load()?;
            let diagnostics = match selection::resolve(&config, &overlay, &env) {
                Ok(selection) => diagnose::diagnose(&selection, &env),
                Err(e) => vec![Diagnostic {
                    level: diagnose::Level::Error,
                    code: "selection",
                    message: e.to_string(),
                }],
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&diagnostics)?);
            } else if diagnostics.is_empty() {
                println!("ok: no problems found");
            } else {
                for d in &diagnostics {
                    println!("{:<7} [{}] {}", d.level.to_string(), d.code, d.message);
                }
            }
            Ok(if diagnose::has_errors(&diagnostics) {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Command::Models => {
            let (config, overlay) = load()?;
            let selection = selection::resolve(&config, &overlay, &env)?;
            let client = ProviderClient::new(&selection.provider, &env)?;
            for id in client.list_models().await? {
                println!("{id}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::LintDocs { path, json } => lint_docs(&path, json),
    }
}

fn lint_docs(path: &std::path::Path, json: bool) -> Result<ExitCode> {
    let report = docs::lint_docs(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for failure in &report.failures {
            println!("{failure}");
        }
        println!(
            "{} file(s), {} toml block(s), {} failure(s)",
            report.files,
            report.blocks,
            report.failures.len()
        );
    }
    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
