use crate::api::{self, Mode, ReportingApi};
use crate::archive::WRITEOFF;
use crate::args::ReportArgs;
use crate::commands::report::{run, Report};
use crate::commands::{Out, ReportSummary};
use crate::config::BaseConfig;
use crate::model::Sheet;
use crate::period::Period;
use crate::report::writeoff;
use crate::{Config, Result};
use serde_json::Value;
use tracing::debug;

/// Lists the write-off acts of the selected bases with their items and names resolved.
pub async fn writeoff(config: Config, args: ReportArgs, mode: Mode) -> Result<Out<ReportSummary>> {
    run(&WriteoffReport, &config, &args, mode).await
}

struct WriteoffReport;

#[async_trait::async_trait]
impl Report for WriteoffReport {
    fn name(&self) -> &'static str {
        WRITEOFF
    }

    fn title(&self) -> &'static str {
        "Акты списания"
    }

    async fn fetch(
        &self,
        api: &mut dyn ReportingApi,
        _base: &BaseConfig,
        period: &Period,
    ) -> Result<Value> {
        api.writeoff_documents(period).await
    }

    async fn sheet(
        &self,
        _config: &Config,
        api: &mut dyn ReportingApi,
        base: &BaseConfig,
        _period: &Period,
        payload: Value,
    ) -> Result<Option<Sheet>> {
        let documents = writeoff::documents(&payload);
        debug!("{} sent {} write-off acts", base.id(), documents.len());
        if documents.is_empty() {
            return Ok(None);
        }
        // Dictionaries are only worth loading once there is something to resolve
        let resolver = api::load_resolver(api).await;
        let rows = writeoff::enrich(&documents, &resolver);
        Ok(Some(writeoff::to_sheet(base.name(), &rows)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::OutputFormat;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_writeoff_csv() {
        let env = TestEnv::with_bases(&["writeoff-csv"]).await;
        let args = ReportArgs::new(vec!["writeoff-csv".to_string()], false)
            .with_range("01.03.2024", "31.03.2024")
            .with_format(OutputFormat::Csv)
            .with_password("secret");
        let out = writeoff(env.config(), args, Mode::Test).await.unwrap();
        let summary = out.structure().unwrap();
        let dir_name = summary.output().file_name().unwrap().to_string_lossy();
        assert!(dir_name.starts_with("Акты списания 01.03.2024-31.03.2024"));

        let csv =
            std::fs::read_to_string(summary.output().join("Ресторан writeoff-csv.csv")).unwrap();
        assert!(csv.starts_with("Акты списания: Ресторан writeoff-csv"));
        assert!(csv.contains("05.03.2024 10:15"));
        assert!(csv.contains("12.03.2024 18:40"));
        assert!(csv.contains("Молоко 3,2% x2"));
        assert!(csv.contains("Сыр моцарелла x0.5"));
        assert!(csv.contains("Основной склад"));
        assert!(csv.contains("Списание порчи"));
        assert!(csv.contains("Пиццерия"));
        // product-3 is not in the listing
        assert!(csv.contains("Неизвестно x1"));
        assert!(csv.contains("275.4"));
    }
}
