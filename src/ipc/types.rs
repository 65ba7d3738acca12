use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::config::Config;
use crate::ids::{MemoryAllocator, SequenceAllocator};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    /// Registry connection; `None` until a workspace is selected.
    pub db: Option<Connection>,
    /// In-memory until a workspace is selected, then backed by its database.
    pub allocator: Box<dyn SequenceAllocator>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            workspace: None,
            db: None,
            allocator: Box::new(MemoryAllocator::new()),
        }
    }
}
