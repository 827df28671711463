//! コンポーネント・環境の定義

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};

/// デプロイ可能なコンポーネント
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Component {
    /// デスクトップWebクライアント
    Desktop,
    /// モバイル/PWAクライアント
    Mobile,
    /// バックエンドAPI
    Backend,
    /// Firebaseルール・設定
    FirebaseConfig,
}

impl Component {
    /// 文字列からパース（エイリアス対応）
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "desktop" | "web" => Ok(Component::Desktop),
            "mobile" | "pwa" => Ok(Component::Mobile),
            "backend" | "api" | "functions" => Ok(Component::Backend),
            "firebase-config" | "firebase" | "rules" => Ok(Component::FirebaseConfig),
            other => Err(ConfigError::UnknownComponent(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Desktop => "desktop",
            Component::Mobile => "mobile",
            Component::Backend => "backend",
            Component::FirebaseConfig => "firebase-config",
        }
    }

    /// デプロイ順の全コンポーネント
    ///
    /// ルール設定 → API → クライアントの順。設定が先に反映されていないと
    /// 新しいAPI・クライアントが古いルールで検証に失敗するため。
    pub fn deploy_order() -> [Component; 4] {
        [
            Component::FirebaseConfig,
            Component::Backend,
            Component::Desktop,
            Component::Mobile,
        ]
    }

    /// クライアントビルド（PWAアーティファクト検証の対象）かどうか
    pub fn is_client(&self) -> bool {
        matches!(self, Component::Desktop | Component::Mobile)
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// コンポーネント指定（単一 or 全部）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentSelector {
    All,
    One(Component),
}

impl ComponentSelector {
    pub fn parse(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("all") {
            Ok(ComponentSelector::All)
        } else {
            Ok(ComponentSelector::One(Component::parse(s)?))
        }
    }

    /// デプロイ順に展開
    pub fn resolve(&self) -> Vec<Component> {
        match self {
            ComponentSelector::All => Component::deploy_order().to_vec(),
            ComponentSelector::One(c) => vec![*c],
        }
    }
}

/// デプロイ先環境
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    /// 文字列からパース（dev → development 等のエイリアスを正規化）
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "dev" | "devel" | "development" => Ok(Environment::Development),
            "stg" | "stage" | "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    /// CDNパージ等の本番系処理の対象かどうか
    pub fn is_production_like(&self) -> bool {
        matches!(self, Environment::Staging | Environment::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_aliases() {
        assert_eq!(Environment::parse("dev").unwrap(), Environment::Development);
        assert_eq!(
            Environment::parse("development").unwrap(),
            Environment::Development
        );
        assert_eq!(Environment::parse("stg").unwrap(), Environment::Staging);
        assert_eq!(Environment::parse("PROD").unwrap(), Environment::Production);
        assert!(Environment::parse("qa").is_err());
    }

    #[test]
    fn test_component_aliases() {
        assert_eq!(Component::parse("desktop").unwrap(), Component::Desktop);
        assert_eq!(Component::parse("pwa").unwrap(), Component::Mobile);
        assert_eq!(Component::parse("api").unwrap(), Component::Backend);
        assert_eq!(
            Component::parse("firebase").unwrap(),
            Component::FirebaseConfig
        );
        assert!(Component::parse("unknown").is_err());
    }

    #[test]
    fn test_selector_resolve_order() {
        let all = ComponentSelector::parse("all").unwrap().resolve();
        assert_eq!(
            all,
            vec![
                Component::FirebaseConfig,
                Component::Backend,
                Component::Desktop,
                Component::Mobile,
            ]
        );

        let one = ComponentSelector::parse("mobile").unwrap().resolve();
        assert_eq!(one, vec![Component::Mobile]);
    }

    #[test]
    fn test_serde_kebab_case() {
        let json = serde_json::to_string(&Component::FirebaseConfig).unwrap();
        assert_eq!(json, "\"firebase-config\"");

        let parsed: Component = serde_json::from_str("\"firebase-config\"").unwrap();
        assert_eq!(parsed, Component::FirebaseConfig);
    }
}
