//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{collections::BTreeMap, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::PayloadCodec;
use crate::domain::ApiMode;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "contentlink";
const DEFAULT_MAX_RATE_LIMIT_RETRIES: u32 = 5;
const MAX_INCLUDE_LEVEL: u8 = 10;

/// Command-line arguments for the contentlink binary.
#[derive(Debug, Parser)]
#[command(
    name = "contentlink",
    version,
    about = "Query a headless content API through the contentlink cache"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "CONTENTLINK_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Name of the configured space to query; optional when exactly one is configured.
    #[arg(long, value_name = "NAME")]
    pub space: Option<String>,

    /// Override the log level (e.g. info, debug).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Force JSON log output.
    #[arg(long = "log-json", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub log_json: Option<bool>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Fetch the space itself.
    Space,
    /// Fetch a single entry by id.
    Entry(EntryArgs),
    /// List entries.
    Entries(EntriesArgs),
    /// Fetch a single asset by id.
    Asset(AssetArgs),
    /// List assets.
    Assets(PageArgs),
    /// Fetch a single content type by id.
    #[command(name = "content-type")]
    ContentType(IdArgs),
    /// List every content type of the space.
    #[command(name = "content-types")]
    ContentTypes,
}

#[derive(Debug, Args, Clone)]
pub struct IdArgs {
    pub id: String,
}

#[derive(Debug, Args, Clone)]
pub struct EntryArgs {
    pub id: String,

    /// Locale code to request.
    #[arg(long, value_name = "CODE")]
    pub locale: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct AssetArgs {
    pub id: String,

    #[arg(long, value_name = "CODE")]
    pub locale: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct PageArgs {
    /// Maximum number of items to return.
    #[arg(long, value_parser = clap::value_parser!(u32))]
    pub limit: Option<u32>,

    /// Number of items to skip.
    #[arg(long, value_parser = clap::value_parser!(u32))]
    pub skip: Option<u32>,
}

#[derive(Debug, Args, Clone)]
pub struct EntriesArgs {
    /// Restrict results to one content type id.
    #[arg(long = "content-type", value_name = "ID")]
    pub content_type: Option<String>,

    #[arg(long, value_name = "CODE")]
    pub locale: Option<String>,

    #[command(flatten)]
    pub page: PageArgs,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub spaces: BTreeMap<String, SpaceSettings>,
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

#[derive(Clone)]
pub struct SpaceSettings {
    pub space_id: String,
    pub access_token: String,
    pub api_domain: Option<String>,
    pub mode: ApiMode,
    /// Zero disables rate-limit retries.
    pub rate_limit_retry_delay: Duration,
    pub max_rate_limit_retries: u32,
    pub cache_fail_responses: bool,
    pub typed_resources: bool,
    pub include_level: Option<u8>,
    pub cache_capacity: Option<usize>,
    pub fallback_cache_capacity: Option<usize>,
    pub primary_codec: PayloadCodec,
    pub fallback_codec: PayloadCodec,
}

impl std::fmt::Debug for SpaceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpaceSettings")
            .field("space_id", &self.space_id)
            .field("api_domain", &self.api_domain)
            .field("mode", &self.mode)
            .field("rate_limit_retry_delay", &self.rate_limit_retry_delay)
            .field("max_rate_limit_retries", &self.max_rate_limit_retries)
            .field("cache_fail_responses", &self.cache_fail_responses)
            .field("typed_resources", &self.typed_resources)
            .field("include_level", &self.include_level)
            .field("cache_capacity", &self.cache_capacity)
            .field("fallback_cache_capacity", &self.fallback_cache_capacity)
            .finish_non_exhaustive()
    }
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

impl Settings {
    /// Pick the named space, or the only configured one when no name is given.
    pub fn space(&self, name: Option<&str>) -> Result<(&str, &SpaceSettings), LoadError> {
        match name {
            Some(name) => self
                .spaces
                .get_key_value(name)
                .map(|(name, space)| (name.as_str(), space))
                .ok_or_else(|| LoadError::invalid("spaces", format!("no space named `{name}`"))),
            None => {
                let mut spaces = self.spaces.iter();
                match (spaces.next(), spaces.next()) {
                    (Some((name, space)), None) => Ok((name.as_str(), space)),
                    (None, _) => Err(LoadError::invalid("spaces", "no space is configured")),
                    (Some(_), Some(_)) => Err(LoadError::invalid(
                        "spaces",
                        "several spaces are configured; pick one with --space",
                    )),
                }
            }
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

    builder = builder.add_source(Environment::with_prefix("CONTENTLINK").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_cli_overrides(cli);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    spaces: BTreeMap<String, RawSpaceSettings>,
}

impl RawSettings {
    fn apply_cli_overrides(&mut self, cli: &CliArgs) {
        if let Some(level) = cli.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = cli.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings { logging, spaces } = raw;

        let logging = build_logging_settings(logging)?;
        let spaces = spaces
            .into_iter()
            .map(|(name, space)| {
                let settings = build_space_settings(&name, space)?;
                Ok((name, settings))
            })
            .collect::<Result<BTreeMap<_, _>, LoadError>>()?;

        Ok(Self { logging, spaces })
    }
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

fn build_space_settings(name: &str, space: RawSpaceSettings) -> Result<SpaceSettings, LoadError> {
    let space_id = required(space.space_id, "spaces.space_id", name)?;
    let access_token = required(space.access_token, "spaces.access_token", name)?;

    let api_domain = space.api_domain.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let mode = match (space.preview, space.management) {
        (true, true) => {
            return Err(LoadError::invalid(
                "spaces.preview",
                format!("space `{name}` cannot use the preview and management APIs at once"),
            ));
        }
        (true, false) => ApiMode::Preview,
        (false, true) => ApiMode::Management,
        (false, false) => ApiMode::Delivery,
    };

    if let Some(level) = space.include_level
        && level > MAX_INCLUDE_LEVEL
    {
        return Err(LoadError::invalid(
            "spaces.include_level",
            format!("space `{name}`: must be at most {MAX_INCLUDE_LEVEL}"),
        ));
    }

    let cache_capacity = non_zero_capacity(space.cache_capacity, "spaces.cache_capacity", name)?;
    let fallback_cache_capacity = non_zero_capacity(
        space.fallback_cache_capacity,
        "spaces.fallback_cache_capacity",
        name,
    )?;

    Ok(SpaceSettings {
        space_id,
        access_token,
        api_domain,
        mode,
        rate_limit_retry_delay: Duration::from_millis(space.rate_limit_retry_delay_ms),
        max_rate_limit_retries: space
            .max_rate_limit_retries
            .unwrap_or(DEFAULT_MAX_RATE_LIMIT_RETRIES),
        cache_fail_responses: space.cache_fail_responses,
        typed_resources: space.typed_resources,
        include_level: space.include_level,
        cache_capacity,
        fallback_cache_capacity,
        primary_codec: codec(space.compress_primary.unwrap_or(false)),
        fallback_codec: codec(space.compress_fallback.unwrap_or(true)),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSpaceSettings {
    space_id: Option<String>,
    access_token: Option<String>,
    api_domain: Option<String>,
    preview: bool,
    management: bool,
    rate_limit_retry_delay_ms: u64,
    max_rate_limit_retries: Option<u32>,
    cache_fail_responses: bool,
    typed_resources: bool,
    include_level: Option<u8>,
    cache_capacity: Option<usize>,
    fallback_cache_capacity: Option<usize>,
    compress_primary: Option<bool>,
    compress_fallback: Option<bool>,
}

fn required(value: Option<String>, key: &'static str, space: &str) -> Result<String, LoadError> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| LoadError::invalid(key, format!("space `{space}` must set a value")))
}

fn non_zero_capacity(
    value: Option<usize>,
    key: &'static str,
    space: &str,
) -> Result<Option<usize>, LoadError> {
    match value {
        Some(0) => Err(LoadError::invalid(
            key,
            format!("space `{space}`: must be greater than zero"),
        )),
        other => Ok(other),
    }
}

fn codec(compress: bool) -> PayloadCodec {
    if compress {
        PayloadCodec::Zstd
    } else {
        PayloadCodec::Plain
    }
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn raw_space(space_id: &str) -> RawSpaceSettings {
        RawSpaceSettings {
            space_id: Some(space_id.to_string()),
            access_token: Some("token".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn space_defaults_follow_delivery_mode() {
        let mut raw = RawSettings::default();
        raw.spaces.insert("main".to_string(), raw_space("cfexampleapi"));

        let settings = Settings::from_raw(raw).expect("valid settings");
        let space = &settings.spaces["main"];

        assert_eq!(space.mode, ApiMode::Delivery);
        assert_eq!(space.max_rate_limit_retries, 5);
        assert!(space.rate_limit_retry_delay.is_zero());
        assert_eq!(space.primary_codec, PayloadCodec::Plain);
        assert_eq!(space.fallback_codec, PayloadCodec::Zstd);
        assert!(space.cache_capacity.is_none());
        assert_eq!(settings.logging.level, LevelFilter::INFO);
    }

    #[test]
    fn preview_and_management_are_exclusive() {
        let mut raw = RawSettings::default();
        let mut space = raw_space("s");
        space.preview = true;
        space.management = true;
        raw.spaces.insert("main".to_string(), space);

        let err = Settings::from_raw(raw).expect_err("conflicting modes");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "spaces.preview",
                ..
            }
        ));
    }

    #[test]
    fn missing_access_token_is_rejected() {
        let mut raw = RawSettings::default();
        raw.spaces.insert(
            "main".to_string(),
            RawSpaceSettings {
                space_id: Some("s".to_string()),
                access_token: Some("  ".to_string()),
                ..Default::default()
            },
        );

        let err = Settings::from_raw(raw).expect_err("blank token");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "spaces.access_token",
                ..
            }
        ));
    }

    #[test]
    fn include_level_is_bounded() {
        let mut raw = RawSettings::default();
        let mut space = raw_space("s");
        space.include_level = Some(11);
        raw.spaces.insert("main".to_string(), space);

        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn zero_cache_capacity_is_rejected() {
        let mut raw = RawSettings::default();
        let mut space = raw_space("s");
        space.cache_capacity = Some(0);
        raw.spaces.insert("main".to_string(), space);

        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn cli_logging_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.logging.level = Some("info".to_string());

        let cli = CliArgs::parse_from([
            "contentlink",
            "--log-level",
            "debug",
            "--log-json",
            "true",
            "space",
        ]);
        raw.apply_cli_overrides(&cli);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn single_space_is_selected_without_a_name() {
        let mut raw = RawSettings::default();
        raw.spaces.insert("main".to_string(), raw_space("s"));
        let settings = Settings::from_raw(raw).expect("valid settings");

        let (name, space) = settings.space(None).expect("only space");
        assert_eq!(name, "main");
        assert_eq!(space.space_id, "s");
        assert!(settings.space(Some("other")).is_err());
    }

    #[test]
    fn several_spaces_require_a_name() {
        let mut raw = RawSettings::default();
        raw.spaces.insert("a".to_string(), raw_space("s1"));
        raw.spaces.insert("b".to_string(), raw_space("s2"));
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(settings.space(None).is_err());
        let (_, space) = settings.space(Some("b")).expect("named space");
        assert_eq!(space.space_id, "s2");
    }

    #[test]
    fn parse_entries_arguments() {
        let args = CliArgs::parse_from([
            "contentlink",
            "--space",
            "main",
            "entries",
            "--content-type",
            "cat",
            "--limit",
            "3",
        ]);

        assert_eq!(args.space.as_deref(), Some("main"));
        match args.command {
            Command::Entries(entries) => {
                assert_eq!(entries.content_type.as_deref(), Some("cat"));
                assert_eq!(entries.page.limit, Some(3));
                assert_eq!(entries.page.skip, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parse_entry_arguments() {
        let args = CliArgs::parse_from(["contentlink", "entry", "nyancat", "--locale", "tlh"]);
        match args.command {
            Command::Entry(entry) => {
                assert_eq!(entry.id, "nyancat");
                assert_eq!(entry.locale.as_deref(), Some("tlh"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn load_reads_spaces_from_config_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        writeln!(
            file,
            r#"
[logging]
level = "warn"

[spaces.main]
space_id = "cfexampleapi"
access_token = "b4c0n73n7fu1"
preview = true
rate_limit_retry_delay_ms = 250
cache_capacity = 64
compress_primary = true
"#
        )
        .expect("write config");

        let cli = CliArgs::parse_from([
            "contentlink",
            "--config-file",
            file.path().to_str().expect("utf-8 path"),
            "content-types",
        ]);
        let settings = load(&cli).expect("settings load");

        assert_eq!(settings.logging.level, LevelFilter::WARN);
        let space = &settings.spaces["main"];
        assert_eq!(space.space_id, "cfexampleapi");
        assert_eq!(space.mode, ApiMode::Preview);
        assert_eq!(space.rate_limit_retry_delay, Duration::from_millis(250));
        assert_eq!(space.cache_capacity, Some(64));
        assert_eq!(space.primary_codec, PayloadCodec::Zstd);
    }
}
