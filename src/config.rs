//! Configuration file handling.
//!
//! The configuration file is stored at `$IIKO_REPORT_HOME/config.json`. It lists the iiko servers
//! ("bases") reports can be pulled from, along with the login used for all of them and a few
//! output settings. Passwords are never stored; they come from `--password` or `IIKO_PASSWORD`.

use crate::archive::ResponseArchive;
use crate::model::RecordFields;
use crate::report::CalendarPolicy;
use crate::{utils, Result};
use anyhow::{bail, ensure, Context};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use url::Url;

const APP_NAME: &str = "iiko-report";
const CONFIG_VERSION: u8 = 1;
const RESPONSE_COPIES: u32 = 5;
const PIVOT_GROUPS: usize = 4;
const RESPONSES: &str = ".responses";
const CONFIG_JSON: &str = "config.json";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$IIKO_REPORT_HOME` and from there it loads `$IIKO_REPORT_HOME/config.json`. It
/// provides paths to other items that are either configurable or are expected in a certain
/// location within the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    responses: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
}

impl Config {
    /// Creates the home directory, its subdirectories and a starter `config.json` with one
    /// example base that needs to be edited before use.
    ///
    /// # Errors
    /// - Returns an error if any file operations fail, or if a config file already exists.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the iiko-report home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        ensure!(
            !config_path.exists(),
            "A config file already exists at '{}'",
            config_path.display()
        );

        let responses = root.join(RESPONSES);
        utils::make_dir(&responses).await?;

        let config_file = ConfigFile::starter()?;
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            responses,
            config_path,
            config_file,
        })
    }

    /// This will
    /// - validate that the home directory and the config file exist
    /// - load and validate the config file
    /// - create the responses directory if it has gone missing
    pub async fn load(home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The iiko-report home directory is missing, run 'iiko-report init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let responses = root.join(RESPONSES);
        if !responses.is_dir() {
            utils::make_dir(&responses).await?;
        }

        Ok(Self {
            root,
            responses,
            config_path,
            config_file,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Where raw API responses are archived.
    pub fn responses(&self) -> &Path {
        &self.responses
    }

    pub fn response_copies(&self) -> u32 {
        self.config_file.response_copies
    }

    pub fn accept_invalid_certs(&self) -> bool {
        self.config_file.accept_invalid_certs
    }

    pub fn login(&self) -> &str {
        &self.config_file.login
    }

    /// Returns the configured `output_dir`, resolved against the home directory when relative.
    /// Defaults to the home directory itself.
    pub fn output_dir(&self) -> PathBuf {
        match &self.config_file.output_dir {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => self.root.join(p),
            None => self.root.clone(),
        }
    }

    pub fn fields(&self) -> &RecordFields {
        &self.config_file.fields
    }

    pub fn bases(&self) -> &[BaseConfig] {
        &self.config_file.bases
    }

    /// Creates a new `ResponseArchive` for saving raw payloads.
    pub fn archive(&self) -> ResponseArchive {
        ResponseArchive::new(self)
    }

    /// Returns the bases named by `ids` in the order given, or every base when `all` is set.
    /// Repeated ids are only returned once.
    pub fn select_bases(&self, ids: &[String], all: bool) -> Result<Vec<&BaseConfig>> {
        if all {
            return Ok(self.bases().iter().collect());
        }
        ensure!(!ids.is_empty(), "Choose at least one base with --base, or use --all");

        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            let Some(base) = self.bases().iter().find(|b| b.id == *id) else {
                let known: Vec<&str> = self.bases().iter().map(BaseConfig::id).collect();
                bail!("Unknown base '{id}', the configured bases are: {}", known.join(", "));
            };
            selected.push(base);
        }
        Ok(selected)
    }

    #[cfg(test)]
    /// Replaces the configured bases, and saves the config file.
    pub(crate) async fn set_bases(&mut self, bases: Vec<BaseConfig>) -> Result<()> {
        self.config_file.bases = bases;
        self.config_file.save(&self.config_path).await
    }
}

/// One iiko server that reports can be pulled from.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct BaseConfig {
    /// Short, unique identifier used on the command line and in archive file names.
    id: String,

    /// The restaurant name shown in report titles and used as the sheet name.
    name: String,

    /// The API root, e.g. `https://example.iiko.it:443/resto/api`.
    url: Url,

    /// The OLAP preset behind the ledger report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preset_id: Option<String>,

    /// The OLAP preset behind the revenue pivot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    revenue_preset_id: Option<String>,

    /// How the ledger fills in records that lack a week or a day.
    #[serde(default)]
    calendar: CalendarPolicy,

    /// How many group columns the pivot sheet shows.
    #[serde(default = "default_pivot_groups")]
    pivot_groups: usize,
}

fn default_pivot_groups() -> usize {
    PIVOT_GROUPS
}

impl BaseConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: Url) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url,
            preset_id: None,
            revenue_preset_id: None,
            calendar: CalendarPolicy::default(),
            pivot_groups: PIVOT_GROUPS,
        }
    }

    pub fn with_presets(
        mut self,
        preset_id: impl Into<String>,
        revenue_preset_id: impl Into<String>,
    ) -> Self {
        self.preset_id = Some(preset_id.into());
        self.revenue_preset_id = Some(revenue_preset_id.into());
        self
    }

    pub fn with_calendar(mut self, calendar: CalendarPolicy) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The ledger preset, or an error naming the base when none is configured.
    pub fn preset_id(&self) -> Result<&str> {
        self.preset_id
            .as_deref()
            .with_context(|| format!("Base '{}' has no preset_id configured", self.id))
    }

    /// The revenue preset, or an error naming the base when none is configured.
    pub fn revenue_preset_id(&self) -> Result<&str> {
        self.revenue_preset_id
            .as_deref()
            .with_context(|| format!("Base '{}' has no revenue_preset_id configured", self.id))
    }

    pub fn calendar(&self) -> CalendarPolicy {
        self.calendar
    }

    pub fn pivot_groups(&self) -> usize {
        self.pivot_groups
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "iiko-report",
///   "config_version": 1,
///   "login": "admin",
///   "accept_invalid_certs": false,
///   "response_copies": 5,
///   "output_dir": "reports",
///   "bases": [
///     {
///       "id": "kursk",
///       "name": "Курск",
///       "url": "https://kursk.iiko.it:443/resto/api",
///       "preset_id": "4c0f9d5e-8f3e-4a0e-9a57-0b1f2ce7f0a1",
///       "revenue_preset_id": "8d2b7a10-52e4-4f3b-b1de-6c7a9f3e2d55",
///       "calendar": "first_week_monday",
///       "pivot_groups": 4
///     }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "iiko-report"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// The login used for every base
    login: String,

    /// Whether to trust self-signed server certificates
    #[serde(default)]
    accept_invalid_certs: bool,

    /// Number of archived copies to keep per base and report
    #[serde(default = "default_response_copies")]
    response_copies: u32,

    /// Where reports are written (optional, relative to the home directory or absolute)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_dir: Option<PathBuf>,

    /// OLAP column names, in case the presets use different ones
    #[serde(default, skip_serializing_if = "is_default_fields")]
    fields: RecordFields,

    bases: Vec<BaseConfig>,
}

fn default_response_copies() -> u32 {
    RESPONSE_COPIES
}

fn is_default_fields(fields: &RecordFields) -> bool {
    *fields == RecordFields::default()
}

impl ConfigFile {
    /// The config written by `init`.
    fn starter() -> Result<Self> {
        let url = Url::parse("https://example.iiko.it:443/resto/api")
            .context("Invalid starter URL")?;
        let base = BaseConfig::new("example", "Пример", url).with_presets(
            "00000000-0000-0000-0000-000000000000",
            "00000000-0000-0000-0000-000000000000",
        );
        Ok(Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            login: "admin".to_string(),
            accept_invalid_certs: false,
            response_copies: RESPONSE_COPIES,
            output_dir: None,
            fields: RecordFields::default(),
            bases: vec![base],
        })
    }

    /// Loads and validates a ConfigFile from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or fails validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;
        config
            .validate()
            .with_context(|| format!("Invalid config file at {}", path.display()))?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            self.app_name
        );
        ensure!(!self.bases.is_empty(), "No bases are configured");

        let mut ids = HashSet::new();
        for base in &self.bases {
            ensure!(!base.id.trim().is_empty(), "A base has an empty id");
            ensure!(
                !base.id.contains(['/', '\\']) && !base.id.contains(".."),
                "The base id '{}' must not contain '/', '\\' or '..'",
                base.id
            );
            ensure!(ids.insert(base.id.as_str()), "The base id '{}' is used twice", base.id);
        }
        Ok(())
    }

    /// Saves the ConfigFile to the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }
}
