//! Configuration for the `snorkel` subcommands.
//!
//! Each subcommand has a clap `Args` struct whose unset flags fall back to
//! environment variables; the `TryFrom` conversions validate them into the
//! config structs the rest of the binary uses without re-parsing.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{Context, Result, anyhow, bail};
use clap::Args;
use snorkel_core::ApiVersion;

/// Mask service host used when neither a flag nor `SNORKEL_DEFAULT_HOST` is set.
pub const DEFAULT_HOST: &str = "http://localhost:5000";

#[derive(Clone, Debug)]
/// Upstream settings shared by every subcommand.
pub struct UpstreamConfig {
    /// Mask service host, without a trailing slash.
    pub host: String,
    pub api: ApiVersion,
    /// Per-request timeout applied by the HTTP client.
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub upstream: UpstreamConfig,
    /// Handed to the browser shell through `/config`.
    pub api_key: String,
    /// JSON file of named geometries served at `/geometries`.
    pub geometries: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct SubmitConfig {
    pub upstream: UpstreamConfig,
    /// Overrides the catalog's default layer.
    pub layer: Option<String>,
    /// Overrides the newest version of the chosen layer.
    pub version: Option<String>,
    pub geometry: GeometrySource,
    pub geometries: Option<PathBuf>,
    /// Where to write the decoded mask image.
    pub output: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
/// Where the submitted geometry text comes from.
pub enum GeometrySource {
    /// First preset, or the built-in fallback polygon.
    Default,
    Inline(String),
    File(PathBuf),
    Preset(String),
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub upstream: UpstreamConfig,
    /// Print the catalog as JSON instead of a listing.
    pub json: bool,
}

/// Flags naming the mask service.
#[derive(Debug, Args)]
pub struct UpstreamArgs {
    /// Mask service host.
    #[arg(long, env = "SNORKEL_DEFAULT_HOST", default_value = DEFAULT_HOST)]
    pub host: String,
    /// Mask API version (v1 or v2).
    #[arg(long, default_value = "v2")]
    pub api: ApiVersion,
    /// Upstream request timeout in seconds.
    #[arg(long = "timeout", env = "SNORKEL_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,
}

/// CLI arguments accepted by the `serve` subcommand.
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address the proxy listens on.
    #[arg(long, env = "SNORKEL_BIND", default_value = "0.0.0.0:5000")]
    pub bind: String,
    /// Maps API key exposed to the browser shell.
    #[arg(long = "api-key", env = "GOOGLE_MAPS_API_KEY", default_value = "")]
    pub api_key: String,
    /// Geometry presets JSON file.
    #[arg(long, env = "SNORKEL_GEOMETRIES", value_name = "PATH")]
    pub geometries: Option<PathBuf>,
    #[command(flatten)]
    pub upstream: UpstreamArgs,
}

/// CLI arguments accepted by the `submit` subcommand.
#[derive(Debug, Args)]
pub struct SubmitArgs {
    /// Layer to mask; defaults to the first catalog layer with versions.
    #[arg(long)]
    pub layer: Option<String>,
    /// Layer version; defaults to the newest one.
    #[arg(long)]
    pub version: Option<String>,
    /// Geometry as GeoJSON text.
    #[arg(long, conflicts_with_all = ["geometry_file", "preset"])]
    pub geometry: Option<String>,
    /// Read the geometry from a file.
    #[arg(long = "geometry-file", value_name = "PATH", conflicts_with = "preset")]
    pub geometry_file: Option<PathBuf>,
    /// Name of a preset from the geometries file.
    #[arg(long)]
    pub preset: Option<String>,
    /// Geometry presets JSON file.
    #[arg(long, env = "SNORKEL_GEOMETRIES", value_name = "PATH")]
    pub geometries: Option<PathBuf>,
    /// Write the returned mask image here.
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub upstream: UpstreamArgs,
}

/// CLI arguments accepted by the `catalog` subcommand.
#[derive(Debug, Args)]
pub struct CatalogArgs {
    /// Print the raw catalog as JSON.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub json: bool,
    #[command(flatten)]
    pub upstream: UpstreamArgs,
}

impl TryFrom<UpstreamArgs> for UpstreamConfig {
    type Error = anyhow::Error;

    fn try_from(args: UpstreamArgs) -> Result<Self> {
        let host = args.host.trim().trim_end_matches('/').to_string();
        if host.is_empty() {
            bail!("Missing host. Provide --host <url> or set SNORKEL_DEFAULT_HOST.");
        }
        if !(host.starts_with("http://") || host.starts_with("https://")) {
            bail!("--host must be an http:// or https:// URL, got {host:?}");
        }
        if args.timeout_secs == 0 {
            bail!("--timeout must be at least 1 second");
        }
        Ok(Self {
            host,
            api: args.api,
            timeout: Duration::from_secs(args.timeout_secs),
        })
    }
}

impl TryFrom<ServeArgs> for ServeConfig {
    type Error = anyhow::Error;

    fn try_from(args: ServeArgs) -> Result<Self> {
        let bind = args
            .bind
            .parse::<SocketAddr>()
            .with_context(|| format!("--bind must be <ip>:<port>, got {:?}", args.bind))?;
        Ok(Self {
            bind,
            upstream: args.upstream.try_into()?,
            api_key: args.api_key,
            geometries: args.geometries,
        })
    }
}

impl TryFrom<SubmitArgs> for SubmitConfig {
    type Error = anyhow::Error;

    fn try_from(args: SubmitArgs) -> Result<Self> {
        let geometry = match (args.geometry, args.geometry_file, args.preset) {
            (Some(text), None, None) => GeometrySource::Inline(text),
            (None, Some(path), None) => GeometrySource::File(path),
            (None, None, Some(name)) => {
                if args.geometries.is_none() {
                    bail!("--preset needs a presets file; pass --geometries or set SNORKEL_GEOMETRIES");
                }
                GeometrySource::Preset(name)
            }
            (None, None, None) => GeometrySource::Default,
            _ => bail!("--geometry, --geometry-file and --preset are mutually exclusive"),
        };
        let blank = |value: &Option<String>| value.as_deref().is_some_and(|v| v.trim().is_empty());
        if blank(&args.layer) || blank(&args.version) {
            return Err(anyhow!("--layer and --version must not be empty"));
        }

        Ok(Self {
            upstream: args.upstream.try_into()?,
            layer: args.layer,
            version: args.version,
            geometry,
            geometries: args.geometries,
            output: args.output,
        })
    }
}

impl TryFrom<CatalogArgs> for CatalogConfig {
    type Error = anyhow::Error;

    fn try_from(args: CatalogArgs) -> Result<Self> {
        Ok(Self {
            upstream: args.upstream.try_into()?,
            json: args.json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(host: &str) -> UpstreamArgs {
        UpstreamArgs {
            host: host.into(),
            api: ApiVersion::V2,
            timeout_secs: 30,
        }
    }

    #[test]
    fn host_trailing_slash_is_trimmed() {
        let config = UpstreamConfig::try_from(upstream(" http://mask.example/ ")).unwrap();
        assert_eq!(config.host, "http://mask.example");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn host_must_be_http() {
        assert!(UpstreamConfig::try_from(upstream("mask.example")).is_err());
        assert!(UpstreamConfig::try_from(upstream("")).is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut args = upstream(DEFAULT_HOST);
        args.timeout_secs = 0;
        assert!(UpstreamConfig::try_from(args).is_err());
    }

    #[test]
    fn bind_address_is_validated() {
        let args = ServeArgs {
            bind: "localhost".into(),
            api_key: String::new(),
            geometries: None,
            upstream: upstream(DEFAULT_HOST),
        };
        assert!(ServeConfig::try_from(args).is_err());
    }

    fn submit_args() -> SubmitArgs {
        SubmitArgs {
            layer: Some("ndvi".into()),
            version: None,
            geometry: None,
            geometry_file: None,
            preset: None,
            geometries: None,
            output: None,
            upstream: upstream(DEFAULT_HOST),
        }
    }

    #[test]
    fn preset_requires_presets_file() {
        let mut args = submit_args();
        args.preset = Some("farm".into());
        assert!(SubmitConfig::try_from(args).is_err());

        let mut args = submit_args();
        args.preset = Some("farm".into());
        args.geometries = Some(PathBuf::from("geometries.json"));
        let config = SubmitConfig::try_from(args).unwrap();
        assert_eq!(config.geometry, GeometrySource::Preset("farm".into()));
    }

    #[test]
    fn geometry_defaults_when_unset() {
        let config = SubmitConfig::try_from(submit_args()).unwrap();
        assert_eq!(config.geometry, GeometrySource::Default);
        assert_eq!(config.layer.as_deref(), Some("ndvi"));
    }

    #[test]
    fn blank_layer_is_rejected() {
        let mut args = submit_args();
        args.layer = Some("  ".into());
        assert!(SubmitConfig::try_from(args).is_err());
    }
}
