//! CLI command handlers.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use courier_core::api::ApiClient;
use courier_core::config::Config;
use courier_core::session::CredentialStore;

pub mod auth;
pub mod config;
pub mod polyline;
pub mod resources;
pub mod route;
pub mod track;

/// Everything an online command needs, built once per invocation.
pub struct Context {
    pub config: Config,
    pub client: ApiClient,
}

impl Context {
    pub fn load() -> Result<Self> {
        let config = Config::load()?;
        let store = CredentialStore::open_default().context("open session store")?;
        let client = ApiClient::new(&config.api, Arc::new(store))?;
        Ok(Self { config, client })
    }

    pub fn store(&self) -> &CredentialStore {
        self.client.credentials()
    }
}
