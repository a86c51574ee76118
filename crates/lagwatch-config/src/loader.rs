use crate::schema::LagwatchConfig;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Jsonc,
    Json,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;

        match ext {
            "jsonc" => Some(Self::Jsonc),
            "json" => Some(Self::Json),
            "yml" | "yaml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: LagwatchConfig,
    /// `None` when no file was found and defaults are in use.
    pub path: Option<PathBuf>,
    pub format: Option<ConfigFormat>,
}

pub const CONFIG_CANDIDATES: &[&str] = &[
    "lagwatch.jsonc",
    "lagwatch.json",
    "lagwatch.yml",
    "lagwatch.yaml",
    ".lagwatch.jsonc",
    ".lagwatch.json",
    ".lagwatch.yml",
    ".lagwatch.yaml",
];

pub fn load_config(config_path: Option<&Path>) -> Result<LagwatchConfig> {
    resolve_config(config_path).map(|r| r.config)
}

/// An explicit path must exist. Without one, the candidates are searched in
/// the working directory and then `~/.config/lagwatch/`; finding nothing
/// yields the defaults.
pub fn resolve_config(config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let path = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };

    match path {
        Some(path) => load_config_from_file(&path),
        None => Ok(ResolvedConfig {
            config: LagwatchConfig::default(),
            path: None,
            format: None,
        }),
    }
}

pub fn load_config_from_file(path: &Path) -> Result<ResolvedConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| anyhow!("Unknown config format for: {}", path.display()))?;

    let config = parse_config_content(&content, format)
        .with_context(|| format!("Invalid config file: {}", path.display()))?;

    Ok(ResolvedConfig {
        config,
        path: Some(path.to_path_buf()),
        format: Some(format),
    })
}

fn parse_config_content(content: &str, format: ConfigFormat) -> Result<LagwatchConfig> {
    if content.trim().is_empty() {
        return Ok(LagwatchConfig::default());
    }
    match format {
        ConfigFormat::Jsonc => json5::from_str(content).context("Failed to parse JSONC"),
        ConfigFormat::Json => serde_json::from_str(content).context("Failed to parse JSON"),
        ConfigFormat::Yaml => serde_yaml_ng::from_str(content).context("Failed to parse YAML"),
    }
}

pub fn find_config_file() -> Option<PathBuf> {
    find_config_file_in(Path::new("."), dirs::home_dir().as_deref())
}

fn find_config_file_in(cwd: &Path, home: Option<&Path>) -> Option<PathBuf> {
    let global = home.map(|home| home.join(".config").join("lagwatch"));
    std::iter::once(cwd.to_path_buf())
        .chain(global)
        .flat_map(|dir| CONFIG_CANDIDATES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}
