use anyhow::{bail, Context};
use figment::{
    providers::{Env, Serialized},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ids::DEFAULT_EMAIL_DOMAIN;

pub const DEFAULT_BATCH_LIMIT: u32 = 100;

/// Startup settings. `VSPD_*` environment variables override the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace opened before the first request (`VSPD_WORKSPACE`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,
    /// Domain for generated usernames (`VSPD_EMAIL_DOMAIN`).
    pub email_domain: String,
    /// Largest `count` accepted by `ids.generateBatch` (`VSPD_BATCH_LIMIT`).
    pub batch_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace: None,
            email_domain: DEFAULT_EMAIL_DOMAIN.to_string(),
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }
}

impl Config {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default())).merge(Env::prefixed("VSPD_"))
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_figment(Self::figment())
    }

    fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let mut cfg: Config = figment
            .extract()
            .context("invalid VSPD_* configuration")?;

        if cfg
            .workspace
            .as_ref()
            .is_some_and(|p| p.as_os_str().to_string_lossy().trim().is_empty())
        {
            cfg.workspace = None;
        }
        cfg.email_domain = cfg.email_domain.trim().trim_start_matches('@').to_string();
        if cfg.email_domain.is_empty() {
            bail!("VSPD_EMAIL_DOMAIN must not be empty");
        }
        if cfg.batch_limit == 0 {
            bail!("VSPD_BATCH_LIMIT must be at least 1");
        }

        Ok(cfg)
    }
}
