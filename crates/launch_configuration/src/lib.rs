//! Launch configuration management
//!
//! This crate handles parsing the launch configurations of VS Code, either a
//! `launch.json` file or the `launch` section of a `.code-workspace` file.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use eyre::Context;
use serde::Deserialize;

const WORKSPACE_FOLDER: &str = "${workspaceFolder}";
const STAGING_FOLDER_NAME: &str = ".roku-deploy-staging";

/// Handle choosing a specific launch configuration, or if the user has not specified one, then
/// present a list of launch configurations they can choose from
pub enum ChosenLaunchConfiguration {
    /// A specific launch configuration is available
    Specific(LaunchConfiguration),
    /// The specified launch configuration was not found
    NotFound,
    /// The user did not request a specific launch configuration, so present available options
    ToBeChosen(Vec<String>),
}

#[derive(Deserialize)]
struct VsCodeLaunchConfiguration {
    #[serde(rename = "version")]
    _version: String,
    configurations: Vec<LaunchConfiguration>,
}

/// Deserializable model for the launch configuration
#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigFormat {
    VsCode(VsCodeLaunchConfiguration),
    VsCodeWorkspace { launch: VsCodeLaunchConfiguration },
}

impl ConfigFormat {
    fn into_configurations(self) -> Vec<LaunchConfiguration> {
        match self {
            ConfigFormat::VsCode(config) | ConfigFormat::VsCodeWorkspace { launch: config } => {
                config.configurations
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LaunchConfiguration {
    Brightscript(BrightScript),
}

impl LaunchConfiguration {
    pub fn name(&self) -> &str {
        match self {
            LaunchConfiguration::Brightscript(config) => &config.name,
        }
    }
}

pub fn load(
    name: Option<&String>,
    mut r: impl std::io::Read,
) -> eyre::Result<ChosenLaunchConfiguration> {
    let mut contents = String::new();
    r.read_to_string(&mut contents)
        .wrap_err("reading configuration contents")?;
    let configuration = from_str(name, &contents).wrap_err("parsing launch configuration")?;
    Ok(configuration)
}

fn from_str(name: Option<&String>, contents: &str) -> eyre::Result<ChosenLaunchConfiguration> {
    let configurations = jsonc_to_serde(contents)
        .wrap_err("parsing jsonc configuration")?
        .into_configurations();

    let Some(name) = name else {
        let configuration_names = configurations.iter().map(|c| c.name().to_string()).collect();
        return Ok(ChosenLaunchConfiguration::ToBeChosen(configuration_names));
    };

    Ok(configurations
        .into_iter()
        .find(|configuration| configuration.name() == name)
        .map(ChosenLaunchConfiguration::Specific)
        .unwrap_or(ChosenLaunchConfiguration::NotFound))
}

fn jsonc_to_serde(input: &str) -> eyre::Result<ConfigFormat> {
    let value = jsonc_parser::parse_to_serde_value(input, &Default::default())
        .wrap_err("parsing jsonc configuration")?;
    let Some(config_format_value) = value else {
        eyre::bail!("no configuration found");
    };

    let config_format =
        serde_json::from_value(config_format_value).wrap_err("deserializing jsonc::Value value")?;
    Ok(config_format)
}

pub fn load_from_path(
    name: Option<&String>,
    path: impl AsRef<Path>,
) -> eyre::Result<ChosenLaunchConfiguration> {
    let f = std::fs::File::open(path).wrap_err("opening input path")?;
    let config = crate::load(name, f).context("loading file from given path")?;
    Ok(config)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleOutput {
    /// Only output nobody was waiting for.
    #[default]
    Normal,
    /// Everything the device prints, including command replies.
    Full,
}

/// A `"type": "brightscript"` launch configuration as written by the user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrightScript {
    pub name: String,
    pub request: Option<String>,
    pub host: Option<String>,
    pub password: Option<String>,
    pub root_dir: Option<String>,
    pub source_dirs: Option<Vec<String>>,
    /// Deprecated single-folder form of `source_dirs`.
    pub debug_root_dir: Option<String>,
    pub out_dir: Option<String>,
    pub staging_folder_path: Option<String>,
    pub stop_on_entry: Option<bool>,
    pub console_output: Option<ConsoleOutput>,
    pub enable_source_maps: Option<bool>,
    pub enable_debugger_auto_recovery: Option<bool>,
    pub retain_staging_folder: Option<bool>,
    pub bs_const: Option<HashMap<String, bool>>,
}

/// A [`BrightScript`] configuration with every default applied and every
/// path made absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBrightScript {
    pub name: String,
    pub host: String,
    pub password: Option<String>,
    pub root_dir: PathBuf,
    pub source_dirs: Vec<PathBuf>,
    pub out_dir: PathBuf,
    pub staging_folder_path: PathBuf,
    pub stop_on_entry: bool,
    pub console_output: ConsoleOutput,
    pub enable_source_maps: bool,
    pub enable_debugger_auto_recovery: bool,
    pub retain_staging_folder: bool,
    pub bs_const: HashMap<String, bool>,
}

impl BrightScript {
    /// Apply defaults and substitute `${workspaceFolder}`.
    pub fn resolve(&self, workspace_folder: impl AsRef<Path>) -> eyre::Result<ResolvedBrightScript> {
        let workspace_folder = workspace_folder.as_ref();
        let path = |value: &str| resolve_path(workspace_folder, value);

        let host = self.host.as_deref().map(str::trim).unwrap_or_default();
        eyre::ensure!(!host.is_empty(), "configuration {:?} has no host", self.name);

        let source_dirs = match (&self.debug_root_dir, &self.source_dirs) {
            (Some(_), Some(_)) => eyre::bail!("Cannot set both debugRootDir AND sourceDirs"),
            (Some(debug_root_dir), None) => vec![path(debug_root_dir)],
            (None, Some(source_dirs)) => source_dirs.iter().map(|dir| path(dir)).collect(),
            (None, None) => Vec::new(),
        };

        let root_dir = self
            .root_dir
            .as_deref()
            .map(path)
            .unwrap_or_else(|| workspace_folder.to_path_buf());
        let out_dir = self
            .out_dir
            .as_deref()
            .map(path)
            .unwrap_or_else(|| workspace_folder.join("out"));
        let staging_folder_path = self
            .staging_folder_path
            .as_deref()
            .map(path)
            .unwrap_or_else(|| out_dir.join(STAGING_FOLDER_NAME));

        Ok(ResolvedBrightScript {
            name: self.name.clone(),
            host: host.to_string(),
            password: self.password.clone(),
            root_dir,
            source_dirs,
            out_dir,
            staging_folder_path,
            stop_on_entry: self.stop_on_entry.unwrap_or(false),
            console_output: self.console_output.unwrap_or_default(),
            enable_source_maps: self.enable_source_maps.unwrap_or(true),
            enable_debugger_auto_recovery: self.enable_debugger_auto_recovery.unwrap_or(false),
            retain_staging_folder: self.retain_staging_folder.unwrap_or(false),
            bs_const: self.bs_const.clone().unwrap_or_default(),
        })
    }
}

/// Substitute `${workspaceFolder}` and anchor relative paths in the
/// workspace folder.
fn resolve_path(workspace_folder: &Path, value: &str) -> PathBuf {
    let substituted = value.replace(WORKSPACE_FOLDER, &workspace_folder.to_string_lossy());
    workspace_folder.join(substituted)
}
