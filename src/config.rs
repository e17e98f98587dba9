use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, str::FromStr, time::Duration};

/// Which object store backs the uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    /// AWS S3 or an S3-compatible endpoint.
    S3,
    /// In-process store; part URLs point back at this server.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "s3" => Ok(Self::S3),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown store backend `{}` (expected `s3` or `memory`)", other),
        }
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub bucket: String,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub store: StoreBackend,
    pub public_url: Option<String>,
    pub uploader_id: String,
    pub session_ttl: Option<Duration>,
    pub sweep_interval: Duration,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Multipart upload coordinator API")]
pub struct Args {
    /// Host to bind to (overrides UPLOADS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides UPLOADS_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Target bucket (overrides UPLOADS_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Store region (overrides AWS_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Custom S3-compatible endpoint (overrides UPLOADS_S3_ENDPOINT)
    #[arg(long)]
    pub endpoint_url: Option<String>,

    /// Object store backend (overrides UPLOADS_STORE)
    #[arg(long, value_enum)]
    pub store: Option<StoreBackend>,

    /// Base URL clients use to reach this server; memory store only (overrides UPLOADS_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Uploader identity used in object keys (overrides UPLOADS_UPLOADER_ID)
    #[arg(long)]
    pub uploader_id: Option<String>,

    /// Abort sessions older than this many seconds (overrides UPLOADS_SESSION_TTL_SECS)
    #[arg(long)]
    pub session_ttl_secs: Option<u64>,

    /// Seconds between expiry sweeps (overrides UPLOADS_SWEEP_INTERVAL_SECS)
    #[arg(long)]
    pub sweep_interval_secs: Option<u64>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::merge(Args::parse(), |name: &str| env::var(name))
    }

    /// Merge CLI args over values looked up through `var`, over defaults.
    fn merge<F>(args: Args, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let lookup = |name: &str| -> Result<Option<String>> {
            match var(name) {
                Ok(value) => Ok(Some(value)),
                Err(env::VarError::NotPresent) => Ok(None),
                Err(err) => Err(err).with_context(|| format!("reading {}", name)),
            }
        };
        let parsed = |name: &str| -> Result<Option<u64>> {
            lookup(name)?
                .map(|value| {
                    value
                        .parse::<u64>()
                        .with_context(|| format!("parsing {} value `{}`", name, value))
                })
                .transpose()
        };

        // --- Environment fallback ---
        let env_host = lookup("UPLOADS_HOST")?.unwrap_or_else(|| "0.0.0.0".into());
        let env_port = match lookup("UPLOADS_PORT")? {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing UPLOADS_PORT value `{}`", value))?,
            None => 8000,
        };
        let env_bucket = lookup("UPLOADS_BUCKET")?.unwrap_or_else(|| "uploaded-doc-bucket".into());
        let env_region = lookup("AWS_REGION")?.unwrap_or_else(|| "us-east-1".into());
        let env_endpoint = lookup("UPLOADS_S3_ENDPOINT")?;
        let env_store = match lookup("UPLOADS_STORE")? {
            Some(value) => value.parse::<StoreBackend>()?,
            None => StoreBackend::S3,
        };
        let env_public_url = lookup("UPLOADS_PUBLIC_URL")?;
        let env_uploader = lookup("UPLOADS_UPLOADER_ID")?.unwrap_or_else(|| "user_123".into());
        let env_ttl = parsed("UPLOADS_SESSION_TTL_SECS")?;
        let env_sweep = parsed("UPLOADS_SWEEP_INTERVAL_SECS")?.unwrap_or(300);

        // --- Merge ---
        let sweep_secs = args.sweep_interval_secs.unwrap_or(env_sweep);
        if sweep_secs == 0 {
            bail!("sweep interval must be at least one second");
        }

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            bucket: args.bucket.unwrap_or(env_bucket),
            region: args.region.unwrap_or(env_region),
            endpoint_url: args.endpoint_url.or(env_endpoint),
            store: args.store.unwrap_or(env_store),
            public_url: args.public_url.or(env_public_url),
            uploader_id: args.uploader_id.unwrap_or(env_uploader),
            session_ttl: args
                .session_ttl_secs
                .or(env_ttl)
                .map(Duration::from_secs),
            sweep_interval: Duration::from_secs(sweep_secs),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL embedded in memory-store part URLs.
    pub fn public_base_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.port))
    }
}
