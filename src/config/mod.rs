//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "rasoio";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 3000;
const DEFAULT_ADMIN_PORT: u16 = 3001;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_ORIGIN_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_CACHE_VERSION: u32 = 1;
const DEFAULT_DATA_API_PREFIX: &str = "/api/";
const DEFAULT_ASSET_PREFIX: &str = "/assets/";
const DEFAULT_DOCUMENT_ENTRY_LIMIT: usize = 500;
const DEFAULT_MEDIA_ENTRY_LIMIT: usize = 1000;
const DEFAULT_LANDING_PATH: &str = "/";
const DEFAULT_MEDIA_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "ico", "bmp", "woff", "woff2", "ttf",
    "otf",
];

/// Command-line arguments for the Rasoio binary.
#[derive(Debug, Parser)]
#[command(name = "rasoio", version, about = "Rasoio booking edge and dispatch server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "RASOIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Rasoio HTTP services.
    Serve(Box<ServeArgs>),
    /// Apply pending database migrations and exit.
    #[command(name = "migrate")]
    Migrate(MigrateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the public listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the administrative listener host.
    #[arg(long = "server-admin-host", value_name = "HOST")]
    pub server_admin_host: Option<String>,

    /// Override the public listener port.
    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    /// Override the administrative listener port.
    #[arg(long = "server-admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the origin base URL the edge proxies.
    #[arg(long = "edge-origin-url", value_name = "URL")]
    pub edge_origin_url: Option<String>,

    /// Override the deploy cache version encoded into store names.
    #[arg(long = "edge-cache-version", value_name = "VERSION")]
    pub edge_cache_version: Option<u32>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub edge: EdgeSettings,
    pub push: PushSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

/// Edge cache and origin settings. Mirrored into the edge subsystem's own
/// config type at startup.
#[derive(Debug, Clone)]
pub struct EdgeSettings {
    pub origin_url: String,
    pub cache_version: u32,
    pub data_api_prefix: String,
    pub asset_prefix: String,
    pub media_extensions: Vec<String>,
    pub document_entry_limit: usize,
    pub media_entry_limit: usize,
    pub precache_paths: Vec<String>,
    pub landing_path: String,
}

#[derive(Debug, Clone)]
pub struct PushSettings {
    /// Push provider HTTP endpoint.
    pub endpoint: String,
    /// Server key presented to the provider.
    pub api_key: String,
    /// Shared secret required by the admin dispatch API.
    pub admin_token: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("RASOIO").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    edge: RawEdgeSettings,
    push: RawPushSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(host) = overrides.server_admin_host.as_ref() {
            self.server.admin_host = Some(host.clone());
        }
        if let Some(port) = overrides.public_port {
            self.server.public_port = Some(port);
        }
        if let Some(port) = overrides.admin_port {
            self.server.admin_port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(url) = overrides.edge_origin_url.as_ref() {
            self.edge.origin_url = Some(url.clone());
        }
        if let Some(version) = overrides.edge_cache_version {
            self.edge.cache_version = Some(version);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            edge,
            push,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let edge = build_edge_settings(edge)?;
        let push = build_push_settings(push)?;

        Ok(Self {
            server,
            logging,
            database,
            edge,
            push,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let admin_host = server
        .admin_host
        .unwrap_or_else(|| DEFAULT_ADMIN_HOST.to_string());

    let public_port = server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT);
    if public_port == 0 {
        return Err(LoadError::invalid(
            "server.public_port",
            "port must be greater than zero",
        ));
    }

    let admin_port = server.admin_port.unwrap_or(DEFAULT_ADMIN_PORT);
    if admin_port == 0 {
        return Err(LoadError::invalid(
            "server.admin_port",
            "port must be greater than zero",
        ));
    }

    let public_addr = parse_socket_addr(&host, public_port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;
    let admin_addr = parse_socket_addr(&admin_host, admin_port)
        .map_err(|reason| LoadError::invalid("server.admin_addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        public_addr,
        admin_addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_value = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = non_zero_u32(max_value.into(), "database.max_connections")?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_edge_settings(edge: RawEdgeSettings) -> Result<EdgeSettings, LoadError> {
    let origin_url = edge
        .origin_url
        .unwrap_or_else(|| DEFAULT_ORIGIN_URL.to_string());
    url::Url::parse(&origin_url)
        .map_err(|err| LoadError::invalid("edge.origin_url", format!("failed to parse: {err}")))?;

    let data_api_prefix = edge
        .data_api_prefix
        .unwrap_or_else(|| DEFAULT_DATA_API_PREFIX.to_string());
    if !data_api_prefix.starts_with('/') {
        return Err(LoadError::invalid(
            "edge.data_api_prefix",
            "prefix must start with `/`",
        ));
    }

    let asset_prefix = edge
        .asset_prefix
        .unwrap_or_else(|| DEFAULT_ASSET_PREFIX.to_string());
    if !asset_prefix.starts_with('/') {
        return Err(LoadError::invalid(
            "edge.asset_prefix",
            "prefix must start with `/`",
        ));
    }

    let media_extensions = edge.media_extensions.unwrap_or_else(|| {
        DEFAULT_MEDIA_EXTENSIONS
            .iter()
            .map(|ext| ext.to_string())
            .collect()
    });

    let landing_path = edge
        .landing_path
        .unwrap_or_else(|| DEFAULT_LANDING_PATH.to_string());
    if !landing_path.starts_with('/') {
        return Err(LoadError::invalid(
            "edge.landing_path",
            "path must start with `/`",
        ));
    }

    let precache_paths = edge
        .precache_paths
        .unwrap_or_else(|| vec![landing_path.clone()]);
    for path in &precache_paths {
        if !path.starts_with('/') {
            return Err(LoadError::invalid(
                "edge.precache_paths",
                format!("path `{path}` must start with `/`"),
            ));
        }
    }

    Ok(EdgeSettings {
        origin_url,
        cache_version: edge.cache_version.unwrap_or(DEFAULT_CACHE_VERSION),
        data_api_prefix,
        asset_prefix,
        media_extensions,
        document_entry_limit: edge
            .document_entry_limit
            .unwrap_or(DEFAULT_DOCUMENT_ENTRY_LIMIT),
        media_entry_limit: edge.media_entry_limit.unwrap_or(DEFAULT_MEDIA_ENTRY_LIMIT),
        precache_paths,
        landing_path,
    })
}

fn build_push_settings(push: RawPushSettings) -> Result<PushSettings, LoadError> {
    let endpoint = push.endpoint.unwrap_or_default();
    if !endpoint.is_empty() {
        url::Url::parse(&endpoint).map_err(|err| {
            LoadError::invalid("push.endpoint", format!("failed to parse: {err}"))
        })?;
    }

    let admin_token = push.admin_token.unwrap_or_default();
    if !admin_token.is_empty() && admin_token.trim().len() < 16 {
        return Err(LoadError::invalid(
            "push.admin_token",
            "token must be at least 16 characters",
        ));
    }

    Ok(PushSettings {
        endpoint,
        api_key: push.api_key.unwrap_or_default(),
        admin_token,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    admin_host: Option<String>,
    public_port: Option<u16>,
    admin_port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEdgeSettings {
    origin_url: Option<String>,
    cache_version: Option<u32>,
    data_api_prefix: Option<String>,
    asset_prefix: Option<String>,
    media_extensions: Option<Vec<String>>,
    document_entry_limit: Option<usize>,
    media_entry_limit: Option<usize>,
    precache_paths: Option<Vec<String>>,
    landing_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPushSettings {
    endpoint: Option<String>,
    api_key: Option<String>,
    admin_token: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.public_port = Some(4000);
        raw.logging.level = Some("info".to_string());

        let overrides = ServeOverrides {
            public_port: Some(4321),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.public_addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        let overrides = ServeOverrides {
            log_json: Some(true),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn edge_defaults_cover_media_extensions() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
        assert_eq!(settings.edge.cache_version, DEFAULT_CACHE_VERSION);
        assert!(settings.edge.media_extensions.iter().any(|e| e == "webp"));
        assert_eq!(settings.edge.precache_paths, vec!["/".to_string()]);
    }

    #[test]
    fn edge_prefix_must_be_absolute() {
        let mut raw = RawSettings::default();
        raw.edge.data_api_prefix = Some("api/".to_string());
        let err = Settings::from_raw(raw).expect_err("relative prefix rejected");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "edge.data_api_prefix",
                ..
            }
        ));
    }

    #[test]
    fn short_admin_token_is_rejected() {
        let mut raw = RawSettings::default();
        raw.push.admin_token = Some("hunter2".to_string());
        let err = Settings::from_raw(raw).expect_err("short token rejected");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "push.admin_token",
                ..
            }
        ));
    }

    #[test]
    fn default_to_serve_command() {
        let args = CliArgs::parse_from(["rasoio"]);
        let command = args
            .command
            .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
        assert!(matches!(command, Command::Serve(_)));
    }

    #[test]
    fn parse_migrate_arguments() {
        let args = CliArgs::parse_from(["rasoio", "migrate", "--database-url", "postgres://x"]);
        match args.command.expect("migrate command") {
            Command::Migrate(migrate) => {
                assert_eq!(
                    migrate.database.database_url.as_deref(),
                    Some("postgres://x")
                );
            }
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn parse_serve_overrides() {
        let args = CliArgs::parse_from([
            "rasoio",
            "serve",
            "--server-host",
            "0.0.0.0",
            "--edge-cache-version",
            "4",
        ]);

        match args.command.expect("serve command") {
            Command::Serve(serve) => {
                assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
                assert_eq!(serve.overrides.edge_cache_version, Some(4));
            }
            _ => panic!("wrong command parsed"),
        }
    }
}
