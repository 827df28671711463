//! キャッシュバスト処理本体

use crate::error::{CacheError, Result};
use crate::manifest::CacheBustManifest;
use crate::purge::CdnPurger;
use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use shipflow_core::Environment;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// 書き換え対象のService Workerファイル名
const SERVICE_WORKER_FILES: [&str; 3] = ["sw.js", "service-worker.js", "firebase-messaging-sw.js"];

/// キャッシュバストのオプション
#[derive(Debug, Clone)]
pub struct CacheBustOptions {
    pub environment: Environment,

    /// ファイル書き換えをスキップ（デプロイ後の再パージ用モード）
    pub skip_file_rename: bool,

    /// CDNパージをスキップ
    pub skip_cdn_purge: bool,

    /// CDNパージ対象のゾーンID
    pub cdn_zone_id: Option<String>,

    /// パージ対象ドメイン（空ならゾーン全体をパージ）
    pub domains: Vec<String>,
}

impl CacheBustOptions {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            skip_file_rename: false,
            skip_cdn_purge: false,
            cdn_zone_id: None,
            domains: Vec::new(),
        }
    }
}

/// キャッシュバストの実行結果
#[derive(Debug, Clone)]
pub struct CacheBustOutcome {
    /// ハード失敗（出力ディレクトリ不可視等）がなかったか
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub unique_id: String,
    pub files_updated: Vec<PathBuf>,
    pub cache_version: String,
    /// ベストエフォートステップの失敗（非致命）
    pub errors: Vec<String>,
}

/// キャッシュバスト実行器
pub struct CacheBuster {
    output_dir: PathBuf,
    options: CacheBustOptions,
}

impl CacheBuster {
    pub fn new(output_dir: impl AsRef<Path>, options: CacheBustOptions) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            options,
        }
    }

    /// 一意なビルドIDを生成（タイムスタンプ + ランダムサフィックス）
    ///
    /// 同一ミリ秒内の連続実行でも衝突しないようUUID由来のサフィックスを付与。
    pub fn generate_unique_id() -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{}", Utc::now().format("%Y%m%d%H%M%S"), &suffix[..8])
    }

    /// キャッシュバストを実行
    ///
    /// 各ステップは独立したベストエフォート。失敗は `errors` に積むだけで
    /// 残りのステップは続行します。ハード失敗は出力ディレクトリに
    /// アクセスできない場合のみ。
    pub async fn run(&self) -> Result<CacheBustOutcome> {
        if !self.output_dir.is_dir() {
            return Err(CacheError::OutputDirInaccessible(self.output_dir.clone()));
        }

        let unique_id = Self::generate_unique_id();
        let cache_version = format!("cache-{}", unique_id);
        let mut files_updated: Vec<PathBuf> = Vec::new();
        let mut errors: Vec<String> = Vec::new();

        debug!(
            output_dir = %self.output_dir.display(),
            unique_id,
            skip_file_rename = self.options.skip_file_rename,
            "キャッシュバスト開始"
        );

        // 1. ビルドメタデータ
        match self.write_build_meta(&unique_id).await {
            Ok(path) => files_updated.push(path),
            Err(e) => errors.push(format!("build-meta: {}", e)),
        }

        if !self.options.skip_file_rename {
            // 2. エントリHTMLの書き換え
            match self.rewrite_entry_html(&unique_id).await {
                Ok(Some(path)) => files_updated.push(path),
                Ok(None) => debug!("index.html が見つからないためスキップ"),
                Err(e) => errors.push(format!("index.html: {}", e)),
            }

            // 3. Service Workerのキャッシュ名書き換え
            match self.rewrite_service_workers(&unique_id).await {
                Ok(paths) => files_updated.extend(paths),
                Err(e) => errors.push(format!("service-worker: {}", e)),
            }

            // 4. ホストレベルのキャッシュ制御設定
            match self.write_header_configs().await {
                Ok(paths) => files_updated.extend(paths),
                Err(e) => errors.push(format!("headers: {}", e)),
            }
        }

        // 5. バージョンメタデータ
        match self.write_version_record(&unique_id, &cache_version).await {
            Ok(path) => files_updated.push(path),
            Err(e) => errors.push(format!("version: {}", e)),
        }

        // 6. キャッシュバストマニフェスト
        match self.write_manifest(&unique_id, &files_updated).await {
            Ok(path) => files_updated.push(path),
            Err(e) => errors.push(format!("manifest: {}", e)),
        }

        // 7. CDNパージ（本番系環境のみ、失敗は非致命）
        if !self.options.skip_cdn_purge && self.options.environment.is_production_like() {
            errors.extend(self.purge_cdn().await);
        }

        Ok(CacheBustOutcome {
            success: true,
            timestamp: Utc::now(),
            unique_id,
            files_updated,
            cache_version,
            errors,
        })
    }

    /// build-meta.json を出力ディレクトリに書き込み
    async fn write_build_meta(&self, unique_id: &str) -> Result<PathBuf> {
        let path = self.output_dir.join("build-meta.json");
        let meta = serde_json::json!({
            "buildId": unique_id,
            "environment": self.options.environment.as_str(),
            "generatedAt": Utc::now().to_rfc3339(),
        });
        fs::write(&path, serde_json::to_string_pretty(&meta)?).await?;
        Ok(path)
    }

    /// index.html のアセットURLへビルドIDを付与し、キャッシュ制御metaを注入
    async fn rewrite_entry_html(&self, unique_id: &str) -> Result<Option<PathBuf>> {
        let path = self.output_dir.join("index.html");
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;

        // stylesheet/script 参照へクエリパラメータを付与
        let asset_re = Regex::new(r#"(?i)\b(href|src)="([^"?#]+\.(?:css|js))""#)
            .expect("static regex");
        let mut rewritten = asset_re
            .replace_all(&content, |caps: &Captures| {
                format!(r#"{}="{}?v={}""#, &caps[1], &caps[2], unique_id)
            })
            .to_string();

        // 再検証を強制するmetaタグを<head>直後に注入（二重注入は避ける）
        if !rewritten.contains(r#"http-equiv="Cache-Control""#) {
            let head_re = Regex::new(r"(?i)<head[^>]*>").expect("static regex");
            let insert_at = head_re.find(&rewritten).map(|m| m.end());
            if let Some(at) = insert_at {
                let meta_tags = format!(
                    "\n  <meta http-equiv=\"Cache-Control\" content=\"no-cache, no-store, must-revalidate\">\
                     \n  <meta http-equiv=\"Pragma\" content=\"no-cache\">\
                     \n  <meta http-equiv=\"Expires\" content=\"0\">\
                     \n  <meta name=\"build-id\" content=\"{}\">",
                    unique_id
                );
                rewritten.insert_str(at, &meta_tags);
            }
        }

        fs::write(&path, rewritten).await?;
        Ok(Some(path))
    }

    /// Service Workerのキャッシュ名リテラルへビルドIDを埋め込み
    ///
    /// install/activate 時に新しいキャッシュ世代として扱わせるため、
    /// "〜cache〜" を含む文字列リテラルをすべて書き換えます。
    async fn rewrite_service_workers(&self, unique_id: &str) -> Result<Vec<PathBuf>> {
        let cache_name_re =
            Regex::new(r#"(['"])([A-Za-z0-9_.-]*[Cc]ache[A-Za-z0-9_.-]*)(['"])"#)
                .expect("static regex");

        let mut updated = Vec::new();
        for filename in SERVICE_WORKER_FILES {
            let path = self.output_dir.join(filename);
            if !path.exists() {
                continue;
            }

            let content = fs::read_to_string(&path).await?;
            let rewritten = cache_name_re
                .replace_all(&content, |caps: &Captures| {
                    format!("{}{}-{}{}", &caps[1], &caps[2], unique_id, &caps[3])
                })
                .to_string();

            fs::write(&path, rewritten).await?;
            debug!(file = filename, "Service Workerのキャッシュ名を更新");
            updated.push(path);
        }

        Ok(updated)
    }

    /// .htaccess とプラットフォーム向け headers.json を書き込み
    ///
    /// HTMLは常に再検証、ハッシュ付き静的アセットは長期キャッシュ。
    async fn write_header_configs(&self) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        let htaccess = self.output_dir.join(".htaccess");
        let htaccess_content = "\
<FilesMatch \"\\.(html)$\">\n\
  Header set Cache-Control \"no-cache, no-store, must-revalidate\"\n\
  Header set Pragma \"no-cache\"\n\
  Header set Expires \"0\"\n\
</FilesMatch>\n\
<FilesMatch \"\\.(js|css|woff2?|png|jpg|svg|webp)$\">\n\
  Header set Cache-Control \"public, max-age=31536000, immutable\"\n\
</FilesMatch>\n";
        fs::write(&htaccess, htaccess_content).await?;
        written.push(htaccess);

        // 実際に存在するアセット種別だけヘッダルールを出す
        let mut header_rules = vec![serde_json::json!({
            "source": "**/*.html",
            "headers": [{ "key": "Cache-Control", "value": "no-cache, no-store, must-revalidate" }]
        })];
        if self.has_assets("assets/*.js") || self.has_assets("assets/*.css") {
            header_rules.push(serde_json::json!({
                "source": "/assets/**",
                "headers": [{ "key": "Cache-Control", "value": "public, max-age=31536000, immutable" }]
            }));
        }

        let headers_path = self.output_dir.join("headers.json");
        fs::write(
            &headers_path,
            serde_json::to_string_pretty(&serde_json::json!({ "headers": header_rules }))?,
        )
        .await?;
        written.push(headers_path);

        Ok(written)
    }

    fn has_assets(&self, pattern: &str) -> bool {
        let full = format!("{}/{}", self.output_dir.display(), pattern);
        glob::glob(&full)
            .map(|mut paths| paths.next().is_some())
            .unwrap_or(false)
    }

    /// 共有バージョンメタデータ version.json を更新
    async fn write_version_record(&self, unique_id: &str, cache_version: &str) -> Result<PathBuf> {
        let path = self.output_dir.join("version.json");
        let record = serde_json::json!({
            "buildId": unique_id,
            "cacheVersion": cache_version,
            "environment": self.options.environment.as_str(),
            "deployedAt": Utc::now().to_rfc3339(),
        });
        fs::write(&path, serde_json::to_string_pretty(&record)?).await?;
        Ok(path)
    }

    /// cache-manifest.json を書き込み
    async fn write_manifest(
        &self,
        unique_id: &str,
        files_updated: &[PathBuf],
    ) -> Result<PathBuf> {
        let mut manifest =
            CacheBustManifest::new(unique_id, self.options.environment.as_str());
        manifest.files_updated = files_updated
            .iter()
            .filter_map(|p| {
                p.strip_prefix(&self.output_dir)
                    .ok()
                    .map(|rel| rel.display().to_string())
            })
            .collect();

        let path = self.output_dir.join("cache-manifest.json");
        fs::write(&path, serde_json::to_string_pretty(&manifest)?).await?;
        Ok(path)
    }

    /// CDNパージ。失敗はエラーメッセージのリストとして返す（非致命）
    async fn purge_cdn(&self) -> Vec<String> {
        let Some(zone_id) = &self.options.cdn_zone_id else {
            debug!("cdnZoneId 未設定のためCDNパージをスキップ");
            return Vec::new();
        };

        let purger = match CdnPurger::from_env(zone_id.as_str()) {
            Ok(p) => p,
            Err(e) => {
                warn!("CDNパージをスキップ: {}", e);
                return vec![format!("cdn-purge: {}", e)];
            }
        };

        // ドメイン指定があればURL単位、なければゾーン全体
        let files: Vec<String> = self
            .options
            .domains
            .iter()
            .flat_map(|domain| {
                [
                    format!("https://{}/", domain),
                    format!("https://{}/index.html", domain),
                ]
            })
            .collect();

        match purger.purge(&files).await {
            Ok(()) => Vec::new(),
            Err(e) => {
                warn!("CDNパージに失敗: {}", e);
                vec![format!("cdn-purge: {}", e)]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn options() -> CacheBustOptions {
        // developmentはCDNパージ対象外なのでテストがネットワークに出ない
        CacheBustOptions::new(Environment::Development)
    }

    #[test]
    fn test_unique_id_no_collision() {
        let a = CacheBuster::generate_unique_id();
        let b = CacheBuster::generate_unique_id();
        // 同一クロックティック内でもランダムサフィックスで衝突しない
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_missing_output_dir_is_hard_failure() {
        let buster = CacheBuster::new("/nonexistent/dist-12345", options());
        let err = buster.run().await.unwrap_err();
        assert!(matches!(err, CacheError::OutputDirInaccessible(_)));
    }

    #[tokio::test]
    async fn test_html_rewrite() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(
            temp_dir.path().join("index.html"),
            r#"<html><head><title>t</title></head><body><link rel="stylesheet" href="/assets/app.css"><script src="main.js"></script></body></html>"#,
        )
        .unwrap();

        let buster = CacheBuster::new(temp_dir.path(), options());
        let outcome = buster.run().await.unwrap();
        assert!(outcome.success);
        assert!(outcome.errors.is_empty());

        let html = std::fs::read_to_string(temp_dir.path().join("index.html")).unwrap();
        assert!(html.contains(&format!("/assets/app.css?v={}", outcome.unique_id)));
        assert!(html.contains(&format!("main.js?v={}", outcome.unique_id)));
        assert!(html.contains(r#"http-equiv="Cache-Control""#));
        assert!(html.contains(&format!(r#"<meta name="build-id" content="{}">"#, outcome.unique_id)));
    }

    #[tokio::test]
    async fn test_service_worker_cache_name_rewrite() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(
            temp_dir.path().join("sw.js"),
            r#"const CACHE_NAME = 'app-cache'; caches.open('runtime-cache');"#,
        )
        .unwrap();

        let buster = CacheBuster::new(temp_dir.path(), options());
        let outcome = buster.run().await.unwrap();

        let sw = std::fs::read_to_string(temp_dir.path().join("sw.js")).unwrap();
        assert!(sw.contains(&format!("'app-cache-{}'", outcome.unique_id)));
        assert!(sw.contains(&format!("'runtime-cache-{}'", outcome.unique_id)));
    }

    #[tokio::test]
    async fn test_emits_metadata_files() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(temp_dir.path().join("index.html"), "<html><head></head></html>").unwrap();

        let buster = CacheBuster::new(temp_dir.path(), options());
        let outcome = buster.run().await.unwrap();

        for file in ["build-meta.json", "version.json", "cache-manifest.json", ".htaccess", "headers.json"] {
            assert!(temp_dir.path().join(file).exists(), "{} がありません", file);
        }

        let manifest: CacheBustManifest = serde_json::from_str(
            &std::fs::read_to_string(temp_dir.path().join("cache-manifest.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest.build_id, outcome.unique_id);
        assert!(manifest
            .invalidation_targets
            .contains(&"service-worker".to_string()));
        assert!(manifest.client_instructions.force_reload);
        assert!(manifest.files_updated.contains(&"index.html".to_string()));
    }

    #[tokio::test]
    async fn test_skip_file_rename_leaves_html_untouched() {
        let temp_dir = tempdir().unwrap();
        let html = r#"<html><head></head><body><script src="main.js"></script></body></html>"#;
        std::fs::write(temp_dir.path().join("index.html"), html).unwrap();

        let mut opts = options();
        opts.skip_file_rename = true;
        let buster = CacheBuster::new(temp_dir.path(), opts);
        let outcome = buster.run().await.unwrap();
        assert!(outcome.success);

        // HTMLは書き換えず、メタデータ類のみ更新
        let unchanged = std::fs::read_to_string(temp_dir.path().join("index.html")).unwrap();
        assert_eq!(unchanged, html);
        assert!(temp_dir.path().join("version.json").exists());
        assert!(!temp_dir.path().join(".htaccess").exists());
    }

    #[tokio::test]
    async fn test_headers_json_includes_assets_rule_only_when_present() {
        let temp_dir = tempdir().unwrap();
        std::fs::create_dir(temp_dir.path().join("assets")).unwrap();
        std::fs::write(temp_dir.path().join("assets/app-abc123.js"), "//").unwrap();

        let buster = CacheBuster::new(temp_dir.path(), options());
        buster.run().await.unwrap();

        let headers = std::fs::read_to_string(temp_dir.path().join("headers.json")).unwrap();
        assert!(headers.contains("/assets/**"));
        assert!(headers.contains("immutable"));
    }
}
