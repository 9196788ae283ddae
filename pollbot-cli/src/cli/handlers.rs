//! Command handlers

use crate::cli::prompt::TerminalInput;
use crate::cli::qr::PngQrRenderer;
use anyhow::{Context, Result};
use pollbot_core::answer::{AnswerProvider, CredentialPool, PROBE_PROMPT};
use pollbot_core::client::{BridgeClientFactory, GeminiClient, ReasoningClient};
use pollbot_core::models::{
    mask_secret, AnswerSpeed, Configuration, Credential, LogLevel, API_KEYS_ENV, BOT_TOKEN_ENV,
};
use pollbot_core::providers::{CredentialInput, PresetInput, TelegramPhotoSink};
use pollbot_core::responder::PollCache;
use pollbot_core::services::init_logging;
use pollbot_core::supervisor::{AccountSupervisor, SupervisorError, SupervisorOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::signal;
use tokio_util::sync::CancellationToken;

const DEFAULT_CONFIG_FILE: &str = "~/.config/pollbot/config.toml";
/// How long shutdown waits for blocking tasks before abandoning them
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Resolve `~/` and the XDG default
fn resolve_config_path(config_file: &str) -> Result<PathBuf> {
    if config_file == DEFAULT_CONFIG_FILE {
        Configuration::default_config_path()
            .map_err(|e| anyhow::anyhow!("Failed to get default config path: {}", e))
    } else if let Some(rest) = config_file.strip_prefix("~/") {
        let home = std::env::var("HOME")
            .map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        Ok(PathBuf::from(home).join(rest))
    } else {
        Ok(PathBuf::from(config_file))
    }
}

/// Load the config file (defaults when missing) with environment overrides applied
fn load_config(config_file: &str) -> Result<(PathBuf, Configuration)> {
    let path = resolve_config_path(config_file)?;
    let mut config = Configuration::load_from_file(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path.display(), e))?;
    config.apply_env();
    Ok((path, config))
}

fn reasoning_client(config: &Configuration) -> Result<Arc<GeminiClient>> {
    let client = GeminiClient::new(
        config.reasoning.base_url.clone(),
        Duration::from_secs(config.reasoning.request_timeout_secs),
    )
    .context("Failed to build reasoning client")?;
    Ok(Arc::new(client))
}

/// Stop the runtime without waiting on blocking tasks past `SHUTDOWN_GRACE`.
///
/// `TerminalInput` reads stdin on the blocking pool; an interrupted login
/// leaves that read parked until a line arrives.
pub fn shutdown_runtime(runtime: Runtime) {
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
}

/// Handle the 'run' command
pub async fn handle_run(accounts: Option<usize>, config_file: String) -> Result<()> {
    let (path, mut config) = load_config(&config_file)?;
    if let Some(count) = accounts {
        config.accounts.count = count;
    }

    if let Err(errors) = config.validate() {
        return Err(anyhow::anyhow!(
            "Invalid configuration ({}):\n  - {}",
            path.display(),
            errors.join("\n  - ")
        ));
    }

    init_logging(config.log_level)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    tracing::info!(config = %path.display(), accounts = config.accounts.count, "Starting pollbot");

    let pool = CredentialPool::new(config.reasoning.api_keys.clone())
        .context("No reasoning API keys configured")?;
    let provider = AnswerProvider::initialize(
        reasoning_client(&config)?,
        pool,
        config.reasoning.model.clone(),
        config.response.fast_mode,
        config.reasoning.max_concurrent_requests,
    )
    .await
    .context("Reasoning API self-check failed")?;

    let factory = Arc::new(BridgeClientFactory::new(
        config.bridge.url.clone(),
        Duration::from_secs(config.bridge.request_timeout_secs),
    ));
    let input: Arc<dyn CredentialInput> = Arc::new(PresetInput::new(
        config.login.presets.clone(),
        Some(Arc::new(TerminalInput::new())),
    ));

    let mut supervisor = AccountSupervisor::new(
        SupervisorOptions::from_config(&config),
        factory,
        input,
        Arc::new(PngQrRenderer::default()),
        Arc::new(provider),
        Arc::new(PollCache::new(config.response.cache_capacity)),
    );
    match &config.delivery.bot_token {
        Some(token) => {
            tracing::info!(
                token = %mask_secret(token),
                chat_id = %config.delivery.chat_id,
                "QR codes will be delivered via Telegram"
            );
            supervisor = supervisor.with_sink(Arc::new(TelegramPhotoSink::new(
                token.clone(),
                config.delivery.chat_id.clone(),
                config.delivery.api_base.clone(),
            )));
        }
        None => tracing::warn!(
            "No bot token set ({}); QR codes are only saved locally",
            BOT_TOKEN_ENV
        ),
    }

    let shutdown = CancellationToken::new();
    let interrupt = shutdown.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            interrupt.cancel();
        }
    });

    match supervisor.run(shutdown).await {
        Ok(()) | Err(SupervisorError::Cancelled) => {
            tracing::info!("Pollbot stopped");
            Ok(())
        }
        Err(e) => Err(anyhow::Error::new(e).context("Pollbot stopped with an error")),
    }
}

/// Handle the 'check-keys' command
pub async fn handle_check_keys(config_file: String) -> Result<()> {
    let (_, config) = load_config(&config_file)?;
    if config.reasoning.api_keys.is_empty() {
        return Err(anyhow::anyhow!(
            "No reasoning API keys configured (config file or {})",
            API_KEYS_ENV
        ));
    }

    let client = reasoning_client(&config)?;
    println!(
        "🔑 Probing {} key(s) against {}",
        config.reasoning.api_keys.len(),
        config.reasoning.model
    );

    let mut adopted = None;
    for (index, key) in config.reasoning.api_keys.iter().enumerate() {
        match client
            .generate(key, &config.reasoning.model, PROBE_PROMPT)
            .await
        {
            Ok(_) => {
                println!("  ✅ key {} ({}) ok", index + 1, key.masked());
                adopted.get_or_insert(index);
            }
            Err(e) => println!("  ❌ key {} ({}) failed: {}", index + 1, key.masked(), e),
        }
    }

    match adopted {
        Some(index) => {
            println!("\nWould use key {}", index + 1);
            Ok(())
        }
        None => Err(anyhow::anyhow!("Every reasoning API key failed")),
    }
}

/// Handle 'config' without --init: print the effective configuration
pub fn handle_config_show(config_file: String) -> Result<()> {
    let (path, mut config) = load_config(&config_file)?;
    config.reasoning.api_keys = config
        .reasoning
        .api_keys
        .iter()
        .map(|k| Credential::new(k.masked()))
        .collect();
    config.delivery.bot_token = config.delivery.bot_token.as_deref().map(mask_secret);

    println!("📄 Config file: {}", path.display());
    println!("{}", toml::to_string_pretty(&config).context("Failed to render config")?);
    Ok(())
}

fn read_user_input_sync() -> Result<String> {
    let mut buffer = String::new();
    io::stdin()
        .read_line(&mut buffer)
        .context("Failed to read from stdin")?;
    Ok(buffer)
}

fn ask(question: &str) -> Result<String> {
    print!("{}", question);
    io::stdout().flush()?;
    Ok(read_user_input_sync()?.trim().to_string())
}

fn ask_bool(question: &str, current: bool) -> Result<bool> {
    let answer = ask(&format!(
        "{} (y/n) [{}]: ",
        question,
        if current { "y" } else { "n" }
    ))?;
    Ok(if answer.is_empty() {
        current
    } else {
        matches!(answer.to_lowercase().as_str(), "y" | "yes")
    })
}

fn parse_speed(value: &str) -> Option<AnswerSpeed> {
    match value.to_lowercase().as_str() {
        "instant" => Some(AnswerSpeed::Instant),
        "superfast" => Some(AnswerSpeed::Superfast),
        "fast" => Some(AnswerSpeed::Fast),
        "normal" => Some(AnswerSpeed::Normal),
        _ => None,
    }
}

fn parse_log_level(value: &str) -> Option<LogLevel> {
    match value.to_lowercase().as_str() {
        "error" => Some(LogLevel::Error),
        "warn" => Some(LogLevel::Warn),
        "info" => Some(LogLevel::Info),
        "debug" => Some(LogLevel::Debug),
        "trace" => Some(LogLevel::Trace),
        _ => None,
    }
}

/// Handle the 'config --init' command
pub async fn handle_config_init(config_file: String) -> Result<()> {
    println!("⚙️  Initializing pollbot configuration");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config_path = resolve_config_path(&config_file)?;
    println!("📄 Config file: {}", config_path.display());

    let mut config = if config_path.exists() {
        println!("⚠️  Configuration file already exists. Loading existing values...");
        Configuration::load_from_file(&config_path)
            .map_err(|e| anyhow::anyhow!("Failed to load existing config: {}", e))?
    } else {
        println!("✨ Creating new configuration with defaults...");
        Configuration::default()
    };

    println!("\n📝 Please answer the following questions (press Enter to use default):\n");

    let count = ask(&format!("Number of accounts [{}]: ", config.accounts.count))?;
    if !count.is_empty() {
        match count.parse::<usize>() {
            Ok(n) if n > 0 => config.accounts.count = n,
            _ => println!("⚠️  Invalid account count, using default"),
        }
    }

    let groups = ask(&format!(
        "Target groups, comma-separated [{}]: ",
        config.groups.targets.join(", ")
    ))?;
    if !groups.is_empty() {
        config.groups.targets = groups
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect();
    }

    let speed = ask(&format!(
        "Answer speed (instant/superfast/fast/normal) [{}]: ",
        format!("{:?}", config.response.speed).to_lowercase()
    ))?;
    if !speed.is_empty() {
        match parse_speed(&speed) {
            Some(speed) => config.response.speed = speed,
            None => println!("⚠️  Invalid speed, using default"),
        }
    }

    config.response.fast_mode = ask_bool("Fast mode", config.response.fast_mode)?;
    config.response.auto_vote = ask_bool("Vote automatically", config.response.auto_vote)?;

    let model = ask(&format!("Reasoning model [{}]: ", config.reasoning.model))?;
    if !model.is_empty() {
        config.reasoning.model = model;
    }

    let folder = ask(&format!(
        "Session folder [{}]: ",
        config.accounts.session_folder.display()
    ))?;
    if !folder.is_empty() {
        config.accounts.session_folder = PathBuf::from(folder);
    }

    let level = ask(&format!(
        "Log level (error/warn/info/debug/trace) [{}]: ",
        format!("{:?}", config.log_level).to_lowercase()
    ))?;
    if !level.is_empty() {
        match parse_log_level(&level) {
            Some(level) => config.log_level = level,
            None => println!("⚠️  Invalid log level, using default"),
        }
    }

    println!(
        "   API keys and the bot token should be set via environment \
         ({} and {}); they are not prompted for here.",
        API_KEYS_ENV, BOT_TOKEN_ENV
    );

    println!("\n🔍 Validating configuration...");
    let mut probe = config.clone();
    probe.apply_env();
    match probe.validate() {
        Ok(()) => println!("✅ Configuration is valid"),
        Err(errors) => {
            println!("⚠️  Configuration is incomplete:");
            for error in errors {
                println!("   - {}", error);
            }
        }
    }

    config
        .save_to_file(&config_path)
        .map_err(|e| anyhow::anyhow!("Failed to save config: {}", e))?;
    println!("\n💾 Configuration saved to {}", config_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_config_path() {
        assert_eq!(
            resolve_config_path("./pollbot.toml").unwrap(),
            PathBuf::from("./pollbot.toml")
        );
        if let Ok(home) = std::env::var("HOME") {
            assert_eq!(
                resolve_config_path("~/bots/pollbot.toml").unwrap(),
                PathBuf::from(home).join("bots/pollbot.toml")
            );
        }
    }

    #[test]
    fn test_shutdown_does_not_wait_for_parked_blocking_read() {
        let runtime = Runtime::new().unwrap();
        let (release, parked) = std::sync::mpsc::channel::<()>();
        let (started_tx, started) = std::sync::mpsc::channel();
        runtime.spawn_blocking(move || {
            let _ = started_tx.send(());
            // Stands in for a stdin read nobody answers
            let _ = parked.recv();
        });
        started.recv().unwrap();

        let begun = std::time::Instant::now();
        shutdown_runtime(runtime);
        assert!(begun.elapsed() < Duration::from_secs(5));
        let _ = release.send(());
    }

    #[test]
    fn test_parse_choices() {
        assert_eq!(parse_speed("Fast"), Some(AnswerSpeed::Fast));
        assert_eq!(parse_speed("ludicrous"), None);
        assert_eq!(parse_log_level("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(parse_log_level("verbose"), None);
    }

    #[test]
    fn test_load_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let (resolved, config) = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(resolved, path);
        assert_eq!(config.accounts.count, 1);
    }
}
