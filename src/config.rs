use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments; nothing in the
/// service layer reads the environment directly.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub storage_bucket: String,
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Geotagged media archive API")]
pub struct Args {
    /// Host to bind to (overrides GEOARCHIVE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides GEOARCHIVE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides GEOARCHIVE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Object storage bucket name (overrides GEOARCHIVE_STORAGE_BUCKET)
    #[arg(long)]
    pub storage_bucket: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("GEOARCHIVE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("GEOARCHIVE_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing GEOARCHIVE_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading GEOARCHIVE_PORT"),
        };
        let env_db = env::var("GEOARCHIVE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/geoarchive.db".into());
        let env_bucket =
            env::var("GEOARCHIVE_STORAGE_BUCKET").unwrap_or_else(|_| "file-mapping-bucket".into());

        // Supabase credentials stay optional: their absence only fails the
        // upload path, not startup. The service-role key wins over the
        // anon key when both are set.
        let supabase_url = env::var("SUPABASE_URL").ok();
        let supabase_key = env::var("SUPABASE_SERVICE_ROLE_KEY")
            .or_else(|_| env::var("SUPABASE_ANON_KEY"))
            .ok();

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            storage_bucket: args.storage_bucket.unwrap_or(env_bucket),
            supabase_url,
            supabase_key,
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
