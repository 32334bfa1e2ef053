//! Server settings: command-line flags first, then the environment, then
//! built-in defaults.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_DATA_DIR: &str = "data";

#[derive(Parser, Debug, Default)]
#[command(name = "docuflow")]
#[command(about = "Folder/document tree server with cascading deletes")]
pub struct Cli {
    /// Listen address (overrides PORT)
    #[arg(short, long)]
    pub addr: Option<SocketAddr>,

    /// Directory holding one JSON record per node (overrides DOCUFLOW_DATA_DIR)
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub data_dir: PathBuf,
}

impl ServerConfig {
    pub fn load(cli: Cli) -> Result<Self> {
        Self::resolve(cli, |key| std::env::var(key).ok())
    }

    /// Resolve settings against an arbitrary environment lookup.
    pub fn resolve(cli: Cli, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let addr = match cli.addr {
            Some(addr) => addr,
            None => {
                let port = match env("PORT") {
                    Some(raw) => raw
                        .trim()
                        .parse::<u16>()
                        .with_context(|| format!("invalid PORT {:?}", raw))?,
                    None => DEFAULT_PORT,
                };
                SocketAddr::from((Ipv4Addr::LOCALHOST, port))
            }
        };
        let data_dir = cli
            .data_dir
            .or_else(|| env("DOCUFLOW_DATA_DIR").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        Ok(Self { addr, data_dir })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ServerConfig::resolve(Cli::default(), env(&[])).unwrap();
        assert_eq!(config.addr, "127.0.0.1:3001".parse().unwrap());
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn environment_fills_in() {
        let config = ServerConfig::resolve(
            Cli::default(),
            env(&[("PORT", "8080"), ("DOCUFLOW_DATA_DIR", "/var/lib/docuflow")]),
        )
        .unwrap();
        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/docuflow"));
    }

    #[test]
    fn flags_win_over_environment() {
        let cli = Cli::try_parse_from(["docuflow", "--addr", "0.0.0.0:9000", "--data-dir", "here"])
            .unwrap();
        let config = ServerConfig::resolve(
            cli,
            env(&[("PORT", "8080"), ("DOCUFLOW_DATA_DIR", "there")]),
        )
        .unwrap();
        assert_eq!(config.addr, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.data_dir, PathBuf::from("here"));
    }

    #[test]
    fn bad_port_is_an_error() {
        let err = ServerConfig::resolve(Cli::default(), env(&[("PORT", "web")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
