use crate::Result;
use clap::Parser;
use rfa_network::ClientConfig;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(about = "Read, write and monitor files on a remote file server")]
pub struct CLIArgs {
    /// YAML file with client settings; flags below take precedence.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Server host name or IPv4 address.
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub server_port: Option<u16>,
    /// Local port the client binds to.
    #[arg(long)]
    pub client_port: Option<u16>,
    /// Attempts per request.
    #[arg(long)]
    pub retries: Option<u32>,
    /// Per-attempt response timeout in milliseconds.
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Cache freshness interval in milliseconds.
    #[arg(long)]
    pub freshness: Option<u64>,
}

pub(crate) fn load_config(args: &CLIArgs) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let file = std::fs::File::open(path)
                .map_err(|e| format!("Could not open {}: {e}", path.display()))?;
            serde_yaml::from_reader(file)?
        }
        None => ClientConfig::default(),
    };
    apply_overrides(&mut config, args)?;
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut ClientConfig, args: &CLIArgs) -> Result<()> {
    if args.host.is_some() || args.server_port.is_some() {
        let (host, port) = split_address(&config.server)?;
        config.server = format!(
            "{}:{}",
            args.host.as_deref().unwrap_or(host),
            args.server_port.unwrap_or(port)
        );
    }
    if let Some(client_port) = args.client_port {
        let (host, _) = split_address(&config.bind)?;
        config.bind = format!("{host}:{client_port}");
    }
    if let Some(retries) = args.retries {
        config.retries = retries;
    }
    if let Some(timeout) = args.timeout {
        config.timeout_ms = timeout;
    }
    if let Some(freshness) = args.freshness {
        config.freshness_ms = freshness;
    }
    Ok(())
}

fn split_address(address: &str) -> Result<(&str, u16)> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| format!("{address:?} is not of the form host:port"))?;
    let port = port
        .parse::<u16>()
        .map_err(|e| format!("{address:?} has an invalid port: {e}"))?;
    Ok((host, port))
}
