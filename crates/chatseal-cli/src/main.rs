//! chatseal: operator CLI for sealed chat messages
//!
//! Commands:
//!   fingerprint --user-id --email       - derive a user's key and print its fingerprint
//!   encrypt --user-id --email [TEXT]    - seal TEXT (or stdin) into a JSON record
//!   decrypt --user-id --email <FILE>    - render a JSON array of records as a user would see it
//!   migrate <FILE> --from --to          - re-encode stored records (e.g. base64 → hex)
//!   config show                         - display the effective configuration
//!
//! Logs go to stderr; command output goes to stdout.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, info};

use chatseal_core::config::ChatSealConfig;
use chatseal_core::{EncryptedMessageRecord, Identity, Role, TextEncoding};
use chatseal_crypto::ChatCrypto;
use chatseal_session::migrate::migrate_records;
use chatseal_session::vault::render_records;
use chatseal_session::{DisplayMessage, MigrationResult};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "chatseal",
    version,
    about = "chatseal message encryption tool",
    long_about = "chatseal: derive per-user message keys, seal and open chat records, migrate record encodings"
)]
struct Cli {
    /// Path to chatseal.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "CHATSEAL_CONFIG",
        default_value = "/etc/chatseal/config.toml"
    )]
    config: PathBuf,

    /// Application secret (overrides crypto.app_secret from the config file)
    #[arg(long, env = "CHATSEAL_APP_SECRET", hide_env_values = true)]
    app_secret: Option<String>,

    /// Log level (trace, debug, info, warn, error); defaults to log.level
    #[arg(long, env = "CHATSEAL_LOG")]
    log: Option<String>,

    /// Log format; defaults to log.format
    #[arg(long, env = "CHATSEAL_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Derive a user's key and print its fingerprint
    Fingerprint {
        #[command(flatten)]
        user: UserArgs,
    },

    /// Seal a message and print the stored record as JSON
    Encrypt {
        #[command(flatten)]
        user: UserArgs,

        /// Author of the message
        #[arg(long, default_value = "user")]
        role: RoleArg,

        /// Message text. When omitted it is read from stdin, and one
        /// trailing line ending (`\n` or `\r\n`) is dropped
        text: Option<String>,
    },

    /// Render a JSON array of stored records
    Decrypt {
        #[command(flatten)]
        user: UserArgs,

        /// File holding the records
        file: PathBuf,
    },

    /// Re-encode the records in a JSON file, replacing it atomically
    Migrate {
        /// File holding the records
        file: PathBuf,

        /// Encoding the records currently use
        #[arg(long, default_value = "base64")]
        from: TextEncoding,

        /// Encoding to rewrite them in
        #[arg(long, default_value = "hex")]
        to: TextEncoding,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
struct UserArgs {
    /// Stable user identifier from the identity provider
    #[arg(long)]
    user_id: String,

    /// User e-mail as registered with the identity provider
    #[arg(long)]
    email: String,
}

impl UserArgs {
    fn identity(&self) -> Identity {
        Identity::new(self.user_id.clone(), self.email.clone())
    }
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    User,
    Assistant,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::User => Role::User,
            RoleArg::Assistant => Role::Assistant,
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli.config).await?;
    if let Some(secret) = &cli.app_secret {
        config.crypto.app_secret = secret.clone();
    }

    let level = cli.log.as_deref().unwrap_or(&config.log.level);
    let format = match &cli.log_format {
        Some(format) => format.clone(),
        None if config.log.format == "json" => LogFormat::Json,
        None => LogFormat::Text,
    };
    init_logging(level, &format);

    debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "chatseal starting"
    );

    match cli.command {
        Commands::Fingerprint { user } => cmd_fingerprint(&config, &user).await,
        Commands::Encrypt { user, role, text } => {
            let text = match text {
                Some(text) => text,
                None => read_stdin()?,
            };
            cmd_encrypt(&config, &user, role.into(), &text).await
        }
        Commands::Decrypt { user, file } => cmd_decrypt(&config, &user, &file).await,
        Commands::Migrate { file, from, to } => {
            let result = migrate_file(&file, from, to).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &cli.config),
    }
}

// ── Config loading / logging ──────────────────────────────────────────────────

async fn load_config(path: &Path) -> Result<ChatSealConfig> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        ChatSealConfig::from_toml_str(&content)
            .with_context(|| format!("parsing config: {}", path.display()))
    } else {
        Ok(ChatSealConfig::default())
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn read_stdin() -> Result<String> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("reading message from stdin")?;
    Ok(strip_line_ending(text))
}

/// Drop the single line ending a shell pipe appends; anything else,
/// including further blank lines, is part of the message.
fn strip_line_ending(mut text: String) -> String {
    if text.ends_with('\n') {
        text.pop();
        if text.ends_with('\r') {
            text.pop();
        }
    }
    text
}

// ── Key derivation ────────────────────────────────────────────────────────────

async fn unlocked(config: &ChatSealConfig, user: &UserArgs) -> Result<ChatCrypto> {
    if config.crypto.app_secret.is_empty() {
        anyhow::bail!(
            "no application secret: set crypto.app_secret, --app-secret, or CHATSEAL_APP_SECRET"
        );
    }
    let crypto = ChatCrypto::from_config(&config.crypto);
    crypto
        .initialize(&user.identity())
        .await
        .context("deriving session key")?;
    Ok(crypto)
}

// ── `chatseal fingerprint` ────────────────────────────────────────────────────

async fn cmd_fingerprint(config: &ChatSealConfig, user: &UserArgs) -> Result<()> {
    let crypto = unlocked(config, user).await?;
    let fingerprint = crypto
        .key_fingerprint()
        .context("key missing after derivation")?;
    println!("{fingerprint}");
    Ok(())
}

// ── `chatseal encrypt` ────────────────────────────────────────────────────────

async fn cmd_encrypt(
    config: &ChatSealConfig,
    user: &UserArgs,
    role: Role,
    text: &str,
) -> Result<()> {
    let crypto = unlocked(config, user).await?;
    let sealed = crypto.encrypt(text).context("sealing message")?;
    let record = EncryptedMessageRecord::sealed(role, sealed);
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

// ── `chatseal decrypt` ────────────────────────────────────────────────────────

async fn cmd_decrypt(config: &ChatSealConfig, user: &UserArgs, file: &Path) -> Result<()> {
    let records = read_records(file).await?;
    let crypto = unlocked(config, user).await?;
    let messages = render_file_records(&crypto, &records);
    println!("{}", serde_json::to_string_pretty(&messages)?);
    Ok(())
}

fn render_file_records(
    crypto: &ChatCrypto,
    records: &[EncryptedMessageRecord],
) -> Vec<DisplayMessage> {
    let messages = render_records(crypto, records);
    let unreadable = messages.iter().filter(|m| !m.readable).count();
    if unreadable > 0 {
        info!(unreadable, total = messages.len(), "some records could not be opened");
    }
    messages
}

// ── `chatseal migrate` ────────────────────────────────────────────────────────

async fn read_records(path: &Path) -> Result<Vec<EncryptedMessageRecord>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading records: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing records: {}", path.display()))
}

async fn migrate_file(path: &Path, from: TextEncoding, to: TextEncoding) -> Result<MigrationResult> {
    let records = read_records(path).await?;
    let (rewritten, result) = migrate_records(&records, from, to);

    if result.migrated > 0 {
        let rendered = serde_json::to_string_pretty(&rewritten)?;
        atomic_replace(path, &rendered)
            .await
            .with_context(|| format!("replacing records: {}", path.display()))?;
    }
    info!(
        path = %path.display(),
        %from,
        %to,
        migrated = result.migrated,
        legacy = result.legacy,
        skipped = result.skipped,
        "records migrated"
    );
    Ok(result)
}

/// Write `content` next to `path`, then rename over it, so readers never
/// see a half-written file. The temp file is removed if either step fails.
async fn atomic_replace(path: &Path, content: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .with_context(|| format!("not a file path: {}", path.display()))?;
    let tmp_path = parent.join(format!(".{}.tmp", file_name.to_string_lossy()));

    let written = match tokio::fs::write(&tmp_path, content.as_bytes()).await {
        Ok(()) => tokio::fs::rename(&tmp_path, path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
            debug!(path = %tmp_path.display(), "temp file not removed: {cleanup}");
        }
        return Err(e).with_context(|| format!("writing {}", tmp_path.display()));
    }
    Ok(())
}

// ── `chatseal config show` ────────────────────────────────────────────────────

fn cmd_config_show(config: &ChatSealConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!(
            "# Configuration: defaults (no file at {})",
            config_path.display()
        );
    }
    println!();
    print!("{}", render_config(config)?);
    Ok(())
}

fn render_config(config: &ChatSealConfig) -> Result<String> {
    let mut shown = config.clone();
    if !shown.crypto.app_secret.is_empty() {
        shown.crypto.app_secret = "[REDACTED]".into();
    }
    toml::to_string_pretty(&shown).context("serializing config to TOML")
}
