use crate::api::{Mode, ReportingApi};
use crate::archive::PIVOT;
use crate::args::ReportArgs;
use crate::commands::report::{run, Report};
use crate::commands::{Out, ReportSummary};
use crate::config::BaseConfig;
use crate::model::Sheet;
use crate::period::Period;
use crate::report::PivotMatrix;
use crate::{normalize, Config, Result};
use serde_json::Value;

/// Builds the revenue pivot for the selected bases: revenue per restaurant group and dish
/// category, with totals.
pub async fn pivot(config: Config, args: ReportArgs, mode: Mode) -> Result<Out<ReportSummary>> {
    run(&PivotReport, &config, &args, mode).await
}

struct PivotReport;

#[async_trait::async_trait]
impl Report for PivotReport {
    fn name(&self) -> &'static str {
        PIVOT
    }

    fn title(&self) -> &'static str {
        "OLAP-Выручка для динамики"
    }

    async fn fetch(
        &self,
        api: &mut dyn ReportingApi,
        base: &BaseConfig,
        period: &Period,
    ) -> Result<Value> {
        api.olap_by_preset(base.revenue_preset_id()?, period).await
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
        Ok(PivotMatrix::aggregate(&records)
            .map(|matrix| matrix.to_sheet(base.name(), period, base.pivot_groups())))
    }
}
