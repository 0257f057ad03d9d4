use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use tokenops_signer::dfns::{DfnsClient, DfnsCtx};
use tokenops_signer::fireblocks::{FireblocksClient, FireblocksCtx, FireblocksEnvironment};
use tokenops_signer::{
    CustodialError, CustodialSigner, LocalKeySigner, PollConfig, SigningError, SigningStrategy,
    WalletSession, WalletSessionSigner,
};
use tracing::Level;
use url::Url;

use crate::builder::DEFAULT_MAX_FEE_TINYBARS;
use crate::capability::CapabilitySource;
use crate::dispatcher::Dispatcher;
use crate::explorer::{Explorer, Network};
use crate::id::EntityId;
use crate::ledger::Ledger;

#[derive(Parser, Debug)]
pub struct Env {
    /// Path to plaintext TOML configuration file
    #[clap(long)]
    pub config: PathBuf,
    /// Path to TOML secrets file
    #[clap(long)]
    pub secrets: PathBuf,
}

/// Non-secret settings deserialized from the plaintext config TOML.
#[derive(Deserialize)]
struct Config {
    log_level: Option<LogLevel>,
    network: Network,
    operator_account: EntityId,
    explorer_url: Option<Url>,
    max_fee_tinybars: Option<u64>,
    poll: Option<PollSettings>,
}

/// Overrides for the custodial signature poller.
#[derive(Debug, Clone, Copy, Deserialize)]
struct PollSettings {
    max_attempts: Option<u32>,
    interval_ms: Option<u64>,
}

/// Secret credentials deserialized from the secrets TOML.
#[derive(Deserialize)]
struct Secrets {
    signer: SignerSecrets,
}

/// Signer type tag and its credentials.
/// Deserialized from the `[signer]` section of the secrets TOML.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum SignerSecrets {
    Local {
        private_key: String,
    },
    Dfns {
        base_url: Url,
        app_id: String,
        auth_token: String,
        wallet_id: String,
    },
    Fireblocks {
        api_user_id: String,
        secret_path: PathBuf,
        vault_account_id: String,
        asset_id: String,
        environment: Option<FireblocksEnvironment>,
    },
    WalletSession,
}

// ===== Runtime types (assembled from Config + Secrets) =====

#[derive(Debug, Clone)]
pub struct Ctx {
    pub log_level: LogLevel,
    pub operator_account: EntityId,
    pub explorer: Explorer,
    pub max_fee_tinybars: u64,
    pub signer: SignerCtx,
}

/// Runtime signer configuration assembled from `SignerSecrets`.
#[derive(Debug, Clone)]
pub enum SignerCtx {
    Local(LocalKeySigner),
    Dfns { ctx: DfnsCtx, poll: PollConfig },
    Fireblocks { ctx: FireblocksCtx, poll: PollConfig },
    WalletSession,
}

impl SignerCtx {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Dfns { .. } => "dfns",
            Self::Fireblocks { .. } => "fireblocks",
            Self::WalletSession => "wallet-session",
        }
    }
}

const DFNS_POLL: PollConfig = PollConfig {
    max_attempts: 3,
    interval: Duration::from_secs(1),
};

const FIREBLOCKS_POLL: PollConfig = PollConfig {
    max_attempts: 10,
    interval: Duration::from_secs(1),
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

impl From<&LogLevel> for Level {
    fn from(log_level: &LogLevel) -> Self {
        (*log_level).into()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML")]
    Toml(#[from] toml::de::Error),
    #[error("invalid explorer URL")]
    ExplorerUrl(#[from] url::ParseError),
    #[error("invalid local signing key")]
    InvalidKey(#[source] SigningError),
    #[error("failed to construct {provider} client")]
    Custodial {
        provider: &'static str,
        #[source]
        source: CustodialError,
    },
}

impl ConfigError {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "failed to read config file",
            Self::Toml(_) => "failed to parse config file",
            Self::ExplorerUrl(_) => "invalid explorer URL",
            Self::InvalidKey(_) => "invalid local signing key",
            Self::Custodial { .. } => "failed to construct custodial client",
        }
    }
}

impl Ctx {
    pub fn load_files(config: &Path, secrets: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(config)?;
        let secrets_str = std::fs::read_to_string(secrets)?;
        Self::from_toml(&config_str, &secrets_str)
    }

    pub fn from_toml(config_toml: &str, secrets_toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(config_toml)?;
        let secrets: Secrets = toml::from_str(secrets_toml)?;

        let explorer = match config.explorer_url {
            Some(base) => Explorer::new(base, config.network),
            None => Explorer::hashscan(config.network)?,
        };

        let signer = assemble_signer(secrets.signer, config.poll)?;

        Ok(Self {
            log_level: config.log_level.unwrap_or(LogLevel::Info),
            operator_account: config.operator_account,
            explorer,
            max_fee_tinybars: config.max_fee_tinybars.unwrap_or(DEFAULT_MAX_FEE_TINYBARS),
            signer,
        })
    }

    /// Build the signing strategy. A wallet-session signer without a paired
    /// `session` is constructed uninitialized and fails on first use.
    pub fn signing_strategy(
        &self,
        session: Option<Arc<dyn WalletSession>>,
    ) -> Result<SigningStrategy, ConfigError> {
        Ok(match &self.signer {
            SignerCtx::Local(signer) => SigningStrategy::LocalKey(signer.clone()),
            SignerCtx::Dfns { ctx, poll } => SigningStrategy::Dfns(CustodialSigner::new(
                Arc::new(DfnsClient::new(ctx.clone())),
                *poll,
            )),
            SignerCtx::Fireblocks { ctx, poll } => {
                let client =
                    FireblocksClient::new(ctx).map_err(|source| ConfigError::Custodial {
                        provider: "fireblocks",
                        source,
                    })?;
                SigningStrategy::Fireblocks(CustodialSigner::new(Arc::new(client), *poll))
            }
            SignerCtx::WalletSession => SigningStrategy::WalletSession(
                session.map_or_else(WalletSessionSigner::uninitialized, WalletSessionSigner::new),
            ),
        })
    }

    pub fn dispatcher(
        &self,
        ledger: Arc<dyn Ledger>,
        capabilities: Arc<dyn CapabilitySource>,
        session: Option<Arc<dyn WalletSession>>,
    ) -> Result<Dispatcher, ConfigError> {
        let signer = self.signing_strategy(session)?;

        Ok(Dispatcher::new(
            ledger,
            signer,
            capabilities,
            self.operator_account,
            self.explorer.clone(),
        )
        .with_max_fee(self.max_fee_tinybars))
    }
}

fn poll_config(defaults: PollConfig, overrides: Option<PollSettings>) -> PollConfig {
    let Some(overrides) = overrides else {
        return defaults;
    };

    PollConfig {
        max_attempts: overrides.max_attempts.unwrap_or(defaults.max_attempts),
        interval: overrides
            .interval_ms
            .map_or(defaults.interval, Duration::from_millis),
    }
}

fn assemble_signer(
    secrets: SignerSecrets,
    poll: Option<PollSettings>,
) -> Result<SignerCtx, ConfigError> {
    Ok(match secrets {
        SignerSecrets::Local { private_key } => SignerCtx::Local(
            LocalKeySigner::from_hex(&private_key).map_err(ConfigError::InvalidKey)?,
        ),
        SignerSecrets::Dfns {
            base_url,
            app_id,
            auth_token,
            wallet_id,
        } => SignerCtx::Dfns {
            ctx: DfnsCtx {
                base_url,
                app_id,
                auth_token,
                wallet_id,
            },
            poll: poll_config(DFNS_POLL, poll),
        },
        SignerSecrets::Fireblocks {
            api_user_id,
            secret_path,
            vault_account_id,
            asset_id,
            environment,
        } => SignerCtx::Fireblocks {
            ctx: FireblocksCtx {
                api_user_id,
                secret: std::fs::read(secret_path)?,
                vault_account_id,
                asset_id,
                environment: environment.unwrap_or(FireblocksEnvironment::Production),
            },
            poll: poll_config(FIREBLOCKS_POLL, poll),
        },
        SignerSecrets::WalletSession => SignerCtx::WalletSession,
    })
}

pub fn setup_tracing(log_level: &LogLevel) {
    let level: Level = log_level.into();
    let default_filter = format!("tokenops={level},tokenops_signer={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}
