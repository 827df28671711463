use shipflow_core::{ComponentSelector, Environment};
use shipflow_tracker::RecordMetadata;

/// 環境名を決定する（共通ロジック）
///
/// 指定がない場合、設定に環境が1つだけ定義されていればそれを使用。
pub fn determine_environment(
    environment: Option<String>,
    config: &shipflow_core::DeployConfig,
) -> anyhow::Result<Environment> {
    if let Some(name) = environment {
        return Ok(Environment::parse(&name)?);
    }

    if config.environments.len() == 1 {
        let name = config.environments.keys().next().unwrap();
        return Ok(Environment::parse(name)?);
    }

    Err(anyhow::anyhow!(
        "環境名を指定してください: ship <command> <env> または SHIPFLOW_ENV=<env>\n利用可能な環境: {}",
        config
            .environments
            .keys()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    ))
}

/// コンポーネント指定をパース
pub fn parse_selector(component: &str) -> anyhow::Result<ComponentSelector> {
    Ok(ComponentSelector::parse(component)?)
}

/// 履歴レコードに載せる実行コンテキストを収集
///
/// git情報が取れない環境（CI外のtarball等）でも失敗しない。
pub async fn collect_metadata() -> RecordMetadata {
    let git_commit = git_output(&["rev-parse", "--short", "HEAD"]).await;
    let git_branch = git_output(&["rev-parse", "--abbrev-ref", "HEAD"]).await;

    RecordMetadata {
        git_commit,
        git_branch,
        operator: std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .ok(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
        previous_deployment_id: None,
        rolled_back_to: None,
        rolled_back_at: None,
    }
}

async fn git_output(args: &[&str]) -> Option<String> {
    let output = shipflow_exec::execute(
        "git",
        args,
        &shipflow_exec::ExecOptions::with_timeout(std::time::Duration::from_secs(10)),
    )
    .await
    .ok()?;

    let trimmed = output.stdout.trim().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// ミリ秒を人間向けに整形
pub fn format_duration_ms(ms: u64) -> String {
    if ms >= 60_000 {
        format!("{}m{}s", ms / 60_000, (ms % 60_000) / 1000)
    } else if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_envs(envs: &[&str]) -> shipflow_core::DeployConfig {
        let mut environments = serde_json::Map::new();
        for env in envs {
            environments.insert((*env).to_string(), serde_json::json!({}));
        }
        serde_json::from_value(serde_json::json!({
            "projects": {},
            "environments": environments,
        }))
        .unwrap()
    }

    #[test]
    fn test_determine_environment_explicit() {
        let config = config_with_envs(&["production", "staging"]);
        let env = determine_environment(Some("prod".to_string()), &config).unwrap();
        assert_eq!(env, Environment::Production);
    }

    #[test]
    fn test_determine_environment_single_fallback() {
        let config = config_with_envs(&["staging"]);
        let env = determine_environment(None, &config).unwrap();
        assert_eq!(env, Environment::Staging);
    }

    #[test]
    fn test_determine_environment_ambiguous() {
        let config = config_with_envs(&["production", "staging"]);
        assert!(determine_environment(None, &config).is_err());
    }

    #[test]
    fn test_format_duration_ms() {
        assert_eq!(format_duration_ms(250), "250ms");
        assert_eq!(format_duration_ms(4200), "4.2s");
        assert_eq!(format_duration_ms(65_000), "1m5s");
    }
}
