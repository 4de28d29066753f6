use crate::api::{Mode, ReportingApi};
use crate::archive::LEDGER;
use crate::args::ReportArgs;
use crate::commands::report::{run, Report};
use crate::commands::{Out, ReportSummary};
use crate::config::BaseConfig;
use crate::model::Sheet;
use crate::period::Period;
use crate::report::Ledger;
use crate::{normalize, Config, Result};
use serde_json::Value;
use tracing::debug;

/// Builds the plan ledger for the selected bases: OLAP records grouped by restaurant group, week
/// and day, with week and group subtotal formulas.
pub async fn ledger(config: Config, args: ReportArgs, mode: Mode) -> Result<Out<ReportSummary>> {
    run(&LedgerReport, &config, &args, mode).await
}

struct LedgerReport;

#[async_trait::async_trait]
impl Report for LedgerReport {
    fn name(&self) -> &'static str {
        LEDGER
    }

    fn title(&self) -> &'static str {
        "OLAP-Планы"
    }

    async fn fetch(
        &self,
        api: &mut dyn ReportingApi,
        base: &BaseConfig,
        period: &Period,
    ) -> Result<Value> {
        api.olap_by_preset(base.preset_id()?, period).await
    }

    async fn sheet(
        &self,
        config: &Config,
        _api: &mut dyn ReportingApi,
        base: &BaseConfig,
        period: &Period,
        payload: Value,
    ) -> Result<Option<Sheet>> {
        let records = normalize::records(payload, config.fields());
        let ledger = Ledger::build(records, base.calendar());
        debug!("{} sent {} ledger records", base.id(), ledger.data_row_count());
        if ledger.is_empty() {
            return Ok(None);
        }
        Ok(Some(ledger.to_sheet(base.name(), period)))
    }
}
