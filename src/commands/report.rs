//! The loop shared by the report commands: one sheet per selected base, failures collected.

use crate::api::{self, Credentials, Mode, ReportingApi};
use crate::archive::ResponseArchive;
use crate::args::ReportArgs;
use crate::commands::{Out, ReportSummary, SourceFailure};
use crate::config::BaseConfig;
use crate::model::Sheet;
use crate::period::Period;
use crate::{sink, Config, Result};
use anyhow::{bail, Context};
use chrono::Local;
use serde_json::Value;
use tracing::{debug, info, warn};

/// One kind of report. The runner fetches a payload per base, archives it, and asks the report to
/// turn it into a sheet.
#[async_trait::async_trait]
pub(super) trait Report: Sync {
    /// Used in archive file names and log messages.
    fn name(&self) -> &'static str;

    /// The start of the output file name.
    fn title(&self) -> &'static str;

    async fn fetch(
        &self,
        api: &mut dyn ReportingApi,
        base: &BaseConfig,
        period: &Period,
    ) -> Result<Value>;

    /// Builds the sheet for `base`, or returns `None` when the payload holds no data.
    async fn sheet(
        &self,
        config: &Config,
        api: &mut dyn ReportingApi,
        base: &BaseConfig,
        period: &Period,
        payload: Value,
    ) -> Result<Option<Sheet>>;
}

/// Runs `report` for every base selected by `args` and writes the sheets that could be built.
/// Fails only when no base produced a sheet.
pub(super) async fn run(
    report: &dyn Report,
    config: &Config,
    args: &ReportArgs,
    mode: Mode,
) -> Result<Out<ReportSummary>> {
    let period = args.period(Local::now().date_naive())?;
    let bases = config.select_bases(args.bases(), args.all())?;
    let credentials = Credentials::new(
        args.login().unwrap_or(config.login()),
        args.password().unwrap_or_default(),
    );
    let output_dir = args
        .output_dir()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| config.output_dir());
    let archive = config.archive();
    let mut sink = sink::create(args.format(), &output_dir, report.title(), &period);

    let mut sources = Vec::new();
    let mut failures = Vec::new();
    for base in bases {
        info!("Getting the {} report for {} ({period})", report.name(), base.name());
        match base_sheet(report, config, base, &credentials, mode, &period, &archive).await {
            Ok(sheet) => {
                sink.add_sheet(&sheet);
                sources.push(base.id().to_string());
            }
            Err(e) => {
                warn!("Skipping {}: {e:#}", base.id());
                failures.push(SourceFailure {
                    base: base.id().to_string(),
                    reason: format!("{e:#}"),
                });
            }
        }
    }

    if sink.sheet_count() == 0 {
        let reasons: Vec<String> = failures
            .iter()
            .map(|f| format!("{}: {}", f.base, f.reason))
            .collect();
        bail!(
            "None of the selected bases produced data for {period}\n{}",
            reasons.join("\n")
        );
    }

    let output = sink.finish().await?;
    let mut message = format!(
        "Wrote the {} report for {} bases to {}",
        report.name(),
        sources.len(),
        output.display()
    );
    if !failures.is_empty() {
        let failed: Vec<&str> = failures.iter().map(|f| f.base.as_str()).collect();
        message.push_str(&format!(", skipped {}", failed.join(", ")));
    }
    let summary = ReportSummary {
        report: report.name().to_string(),
        period: period.to_string(),
        output,
        sources,
        failures,
    };
    Ok(Out::new(message, summary))
}

async fn base_sheet(
    report: &dyn Report,
    config: &Config,
    base: &BaseConfig,
    credentials: &Credentials,
    mode: Mode,
    period: &Period,
    archive: &ResponseArchive,
) -> Result<Sheet> {
    let mut client = api::client(config, base, credentials, mode)?;
    client
        .authenticate()
        .await
        .with_context(|| format!("Unable to log in to {}", base.url()))?;
    let payload = report.fetch(client.as_mut(), base, period).await?;

    match archive.save_json(base.id(), report.name(), &payload).await {
        Ok(path) => debug!("Saved the response to {}", path.display()),
        Err(e) => warn!("Unable to archive the response from {}: {e:#}", base.id()),
    }

    report
        .sheet(config, client.as_mut(), base, period, payload)
        .await?
        .with_context(|| format!("{} returned no data for {period}", base.name()))
}
