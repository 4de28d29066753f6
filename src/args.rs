//! These structs provide the CLI interface for the iiko-report CLI.

use crate::period::{Period, PeriodPreset};
use crate::sink::OutputFormat;
use crate::Result;
use anyhow::bail;
use chrono::NaiveDate;
use clap::{ArgGroup, Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing::level_filters::LevelFilter;

/// iiko-report: builds restaurant report spreadsheets from iiko servers.
///
/// Pulls OLAP and write-off data from one or more iiko servers ("bases") and writes it out as
/// spreadsheets: a plan ledger with weekly and group subtotals, a revenue pivot by group and dish
/// category, and a list of write-off acts. Each selected base becomes one sheet in the output.
///
/// Run `iiko-report init` first, then edit `config.json` in the home directory to list your
/// bases and their OLAP preset ids.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the home directory and a starter configuration file.
    ///
    /// The generated `config.json` lists one example base. Replace it with your servers: each
    /// base needs an id, the restaurant name, the API URL (e.g.
    /// https://example.iiko.it:443/resto/api) and the ids of the OLAP presets the reports use.
    Init,
    /// List the configured bases.
    Bases,
    /// Build the plan ledger: OLAP records by group, week and day with subtotal formulas.
    Ledger(ReportArgs),
    /// Build the revenue pivot: revenue by group and dish category.
    Pivot(ReportArgs),
    /// List write-off acts with their items, totals and resolved names.
    Writeoff(ReportArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG. See the tracing-subscriber crate for instructions.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where configuration and archived responses are held. Defaults to
    /// ~/iiko-report
    #[arg(long, env = "IIKO_REPORT_HOME", default_value_t = default_home())]
    home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, home: PathBuf) -> Self {
        Self {
            log_level,
            home: home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }
}

/// Args shared by the `ledger`, `pivot` and `writeoff` commands. Each command's help text comes
/// from its `Command` variant.
#[derive(Debug, Parser, Clone, Default)]
#[command(group(ArgGroup::new("bases").required(true).args(["base", "all"])))]
pub struct ReportArgs {
    /// The id of a configured base to report on. Can be given more than once.
    #[arg(long = "base", value_name = "ID")]
    base: Vec<String>,

    /// Report on every configured base.
    #[arg(long)]
    all: bool,

    /// A named reporting period. Ignored when --from and --to are given.
    #[arg(long, value_enum, default_value_t = PeriodPreset::CurrentMonth)]
    period: PeriodPreset,

    /// The first day of a custom period, as dd.mm.yyyy
    #[arg(long, requires = "to")]
    from: Option<String>,

    /// The last day of a custom period, as dd.mm.yyyy
    #[arg(long, requires = "from")]
    to: Option<String>,

    /// The output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Xlsx)]
    format: OutputFormat,

    /// Where to write the report. Defaults to the configured output_dir.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Overrides the login from the config file.
    #[arg(long, env = "IIKO_LOGIN")]
    login: Option<String>,

    /// The password for the iiko servers.
    #[arg(long, env = "IIKO_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl ReportArgs {
    pub fn new(bases: Vec<String>, all: bool) -> Self {
        Self {
            base: bases,
            all,
            ..Self::default()
        }
    }

    pub fn with_range(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self.to = Some(to.into());
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn bases(&self) -> &[String] {
        &self.base
    }

    pub fn all(&self) -> bool {
        self.all
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    pub fn login(&self) -> Option<&str> {
        self.login.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// The custom `--from/--to` period when given, otherwise `--period` resolved against `today`.
    pub fn period(&self, today: NaiveDate) -> Result<Period> {
        match (&self.from, &self.to) {
            (Some(from), Some(to)) => Period::parse(from, to),
            (None, None) => Ok(self.period.resolve(today)),
            _ => bail!("--from and --to must be given together"),
        }
    }
}

fn default_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("iiko-report"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or IIKO_REPORT_HOME instead of relying on the default \
                home directory. If you continue using the program right now, you may have \
                problems!",
            );
            PathBuf::from("iiko-report")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
