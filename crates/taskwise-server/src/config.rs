use std::net::{IpAddr, SocketAddr};

use clap::Args;
use taskwise_db::DbConfig;
use taskwise_store::StoreConfig;

pub const DEFAULT_PUBLIC_URL: &str = "http://127.0.0.1:8000";

/// Server settings. Every flag falls back to a `TASKWISE_*` variable.
#[derive(Debug, Clone, Args)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "TASKWISE_BIND", default_value = "0.0.0.0", global = true)]
    pub bind: IpAddr,

    /// Port to listen on
    #[arg(long, env = "TASKWISE_PORT", default_value_t = 8000, global = true)]
    pub port: u16,

    /// SQLite database file (default: $XDG_DATA_HOME/taskwise/taskwise.db)
    #[arg(long, env = "TASKWISE_DB_PATH", global = true)]
    pub db_path: Option<String>,

    /// Root directory of the local object store
    #[arg(long, env = "TASKWISE_DATA_DIR", global = true)]
    pub data_dir: Option<String>,

    /// Externally visible base URL, used to build storage links
    #[arg(long, env = "TASKWISE_PUBLIC_URL", default_value = DEFAULT_PUBLIC_URL, global = true)]
    pub public_url: String,
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            sqlite_path: self.db_path.clone(),
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            local_data_dir: self.data_dir.clone(),
        }
    }
}
