use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub registry_path: String,
    pub s3: S3Settings,
    pub presign_expiry_secs: u64,
    pub upload_concurrency: usize,
}

/// Object-store connection knobs. The endpoint override and path-style flag
/// exist for MinIO/LocalStack setups.
#[derive(Debug, Clone)]
pub struct S3Settings {
    pub region: String,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Field data upload gateway")]
pub struct Args {
    /// Host to bind to (overrides UPLOAD_GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides UPLOAD_GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Path to the deployment registry CSV (overrides UPLOAD_GATEWAY_REGISTRY)
    #[arg(long)]
    pub registry: Option<String>,

    /// Object store region (overrides UPLOAD_GATEWAY_S3_REGION)
    #[arg(long)]
    pub s3_region: Option<String>,

    /// Custom object store endpoint URL (overrides UPLOAD_GATEWAY_S3_ENDPOINT)
    #[arg(long)]
    pub s3_endpoint: Option<String>,

    /// Use path-style bucket addressing (overrides UPLOAD_GATEWAY_S3_PATH_STYLE)
    #[arg(long)]
    pub s3_path_style: bool,

    /// Presigned URL lifetime in seconds (overrides UPLOAD_GATEWAY_PRESIGN_EXPIRY)
    #[arg(long)]
    pub presign_expiry: Option<u64>,

    /// Concurrent store writes per batch (overrides UPLOAD_GATEWAY_UPLOAD_CONCURRENCY)
    #[arg(long)]
    pub upload_concurrency: Option<usize>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into an AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();
        Self::merge(args)
    }

    fn merge(args: Args) -> Result<Self> {
        let env_host = env::var("UPLOAD_GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("UPLOAD_GATEWAY_PORT", 8080)?;
        let env_registry =
            env::var("UPLOAD_GATEWAY_REGISTRY").unwrap_or_else(|_| "./deployments_info.csv".into());
        let env_region = env::var("UPLOAD_GATEWAY_S3_REGION").unwrap_or_else(|_| "eu-west-2".into());
        let env_endpoint = env::var("UPLOAD_GATEWAY_S3_ENDPOINT").ok();
        let env_path_style = env::var("UPLOAD_GATEWAY_S3_PATH_STYLE")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let env_expiry = parse_env("UPLOAD_GATEWAY_PRESIGN_EXPIRY", 3600)?;
        let env_concurrency = parse_env("UPLOAD_GATEWAY_UPLOAD_CONCURRENCY", 8)?;

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            registry_path: args.registry.unwrap_or(env_registry),
            s3: S3Settings {
                region: args.s3_region.unwrap_or(env_region),
                endpoint_url: args.s3_endpoint.or(env_endpoint),
                force_path_style: args.s3_path_style || env_path_style,
            },
            presign_expiry_secs: args.presign_expiry.unwrap_or(env_expiry),
            upload_concurrency: args.upload_concurrency.unwrap_or(env_concurrency),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).context(format!("reading {}", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_args() -> Args {
        Args {
            host: None,
            port: None,
            registry: None,
            s3_region: None,
            s3_endpoint: None,
            s3_path_style: false,
            presign_expiry: None,
            upload_concurrency: None,
        }
    }

    #[test]
    fn args_override_defaults() {
        let mut args = no_args();
        args.port = Some(9999);
        args.s3_endpoint = Some("http://localhost:9000".into());
        args.s3_path_style = true;

        let cfg = AppConfig::merge(args).unwrap();
        assert_eq!(cfg.port, 9999);
        assert_eq!(cfg.s3.endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert!(cfg.s3.force_path_style);
    }

    #[test]
    fn addr_joins_host_and_port() {
        let mut args = no_args();
        args.host = Some("127.0.0.1".into());
        args.port = Some(8080);
        let cfg = AppConfig::merge(args).unwrap();
        assert_eq!(cfg.addr(), "127.0.0.1:8080");
    }
}
