use crate::commands::Out;
use crate::config::BaseConfig;
use crate::{Config, Result};

/// Lists the configured bases.
pub async fn bases(config: Config) -> Result<Out<Vec<BaseConfig>>> {
    let lines: Vec<String> = config
        .bases()
        .iter()
        .map(|b| format!("  {}: {} ({}, {})", b.id(), b.name(), b.url(), b.calendar()))
        .collect();
    let message = format!(
        "{} bases configured in {}\n{}",
        lines.len(),
        config.config_path().display(),
        lines.join("\n")
    );
    Ok(Out::new(message, config.bases().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_bases() {
        let env = TestEnv::with_bases(&["kursk", "kazan"]).await;
        let out = bases(env.config()).await.unwrap();
        assert_eq!(out.structure().unwrap().len(), 2);
        assert!(out.message().contains("kursk: Ресторан kursk"));
        assert!(out.message().contains("first_week_monday"));
    }
}
