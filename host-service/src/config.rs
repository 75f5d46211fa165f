// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use mafia_common::{Catalog, DEFAULT_STORE_SYNC_TIMEOUT_MS, default_catalog, expand_env_vars};
use session_engine::{EngineConfig, WinRule};
use tracing::info;

/// Start-up settings read once from the environment.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub bind_addr: SocketAddr,
    pub catalog_path: Option<String>,
    pub engine: EngineConfig,
    pub dynamo: Option<DynamoSettings>,
}

#[derive(Debug, Clone)]
pub struct DynamoSettings {
    pub endpoint: Option<String>,
    pub table_name: String,
}

impl HostConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let bind_addr = var("HOST_SERVICE_BIND")
            .unwrap_or_else(|| "0.0.0.0:8085".to_string())
            .parse()
            .context("invalid HOST_SERVICE_BIND")?;

        let win_rule = match var("MAFIA_WIN_RULE") {
            Some(value) => WinRule::parse(&value)
                .with_context(|| format!("invalid MAFIA_WIN_RULE {value:?}"))?,
            None => WinRule::default(),
        };

        let sync_timeout_ms = match var("STORE_SYNC_TIMEOUT_MS") {
            Some(value) => value
                .parse::<u64>()
                .context("invalid STORE_SYNC_TIMEOUT_MS")?,
            None => DEFAULT_STORE_SYNC_TIMEOUT_MS,
        };

        let shuffle_seed = var("ROLE_SHUFFLE_SEED")
            .map(|value| value.parse::<u64>())
            .transpose()
            .context("invalid ROLE_SHUFFLE_SEED")?;

        let endpoint = var("DYNAMODB_ENDPOINT");
        let dynamo = (endpoint.is_some() || var("AWS_REGION").is_some()).then(|| DynamoSettings {
            endpoint,
            table_name: var("MAFIA_SESSIONS_TABLE").unwrap_or_else(|| "mafia_sessions".to_string()),
        });

        Ok(Self {
            bind_addr,
            catalog_path: var("MAFIA_CATALOG_PATH"),
            engine: EngineConfig {
                win_rule,
                sync_timeout: Duration::from_millis(sync_timeout_ms),
                shuffle_seed,
            },
            dynamo,
        })
    }

    /// Loads the YAML catalog when a path is configured, otherwise the
    /// built-in one. A configured but unreadable catalog is a start-up error.
    pub fn load_catalog(&self) -> anyhow::Result<Catalog> {
        let Some(path) = &self.catalog_path else {
            info!("no MAFIA_CATALOG_PATH set; using built-in catalog");
            return Ok(default_catalog());
        };

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog file {path}"))?;
        let catalog = Catalog::from_yaml_str(&expand_env_vars(&raw)).map_err(anyhow::Error::msg)?;
        info!(
            path = %path,
            roles = catalog.roles().len(),
            modes = catalog.modes().len(),
            phases = catalog.phases().len(),
            "loaded catalog from YAML"
        );
        Ok(catalog)
    }
}
