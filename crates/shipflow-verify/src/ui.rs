//! UI checks via a headless browser
//!
//! Drives headless Chrome against the deployed URL and asserts page load,
//! selector presence, text presence and the absence of console errors.
//! The browser work is blocking, so it runs on the blocking pool.

use crate::check::{CheckType, VerificationCheck};
use base64::Engine;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions};
use shipflow_core::UiCheckConfig;
use std::time::{Duration, Instant};
use tracing::debug;

/// Upper bound for one UI check, browser launch included
const UI_CHECK_TIMEOUT: Duration = Duration::from_secs(120);

/// Hook installed on reload so errors emitted during load are collected
const CONSOLE_HOOK: &str = r#"
window.__shipflowConsoleErrors = [];
(function () {
    const original = console.error;
    console.error = function (...args) {
        window.__shipflowConsoleErrors.push(args.map(String).join(' '));
        original.apply(console, args);
    };
    window.addEventListener('error', function (e) {
        window.__shipflowConsoleErrors.push(String(e.message));
    });
})();
"#;

/// Run one configured UI check
pub async fn run_ui_check(base_url: &str, config: &UiCheckConfig) -> Vec<VerificationCheck> {
    let url = config
        .url
        .clone()
        .unwrap_or_else(|| base_url.to_string());
    let config = config.clone();

    let handle = tokio::task::spawn_blocking(move || run_ui_check_blocking(&url, &config));

    match tokio::time::timeout(UI_CHECK_TIMEOUT, handle).await {
        Ok(Ok(checks)) => checks,
        Ok(Err(join_err)) => vec![VerificationCheck::failed(
            "ui: browser",
            CheckType::Ui,
            "browser task panicked",
            0,
            join_err.to_string(),
        )],
        Err(_) => vec![VerificationCheck::failed(
            "ui: browser",
            CheckType::Ui,
            "UI check timed out",
            UI_CHECK_TIMEOUT.as_millis() as u64,
            format!("no result within {}s", UI_CHECK_TIMEOUT.as_secs()),
        )],
    }
}

fn run_ui_check_blocking(url: &str, config: &UiCheckConfig) -> Vec<VerificationCheck> {
    let name = &config.name;
    let started = Instant::now();
    debug!(url, check = name, "Running UI check");

    let launch = match LaunchOptions::default_builder()
        .headless(true)
        .sandbox(false)
        .build()
    {
        Ok(options) => options,
        Err(e) => {
            return vec![VerificationCheck::failed(
                format!("ui: {}: page load", name),
                CheckType::Ui,
                "failed to configure the browser",
                0,
                e.to_string(),
            )];
        }
    };

    let (browser, tab) = match Browser::new(launch).and_then(|b| {
        let tab = b.new_tab()?;
        Ok((b, tab))
    }) {
        Ok(pair) => pair,
        Err(e) => {
            return vec![VerificationCheck::failed(
                format!("ui: {}: page load", name),
                CheckType::Ui,
                "failed to launch headless browser",
                started.elapsed().as_millis() as u64,
                e.to_string(),
            )];
        }
    };
    // Hold the browser for the whole check; dropping it closes the tab
    let _browser = browser;

    let mut checks = Vec::new();

    // Page load
    let load_result = tab
        .navigate_to(url)
        .and_then(|t| t.wait_until_navigated());
    let load_elapsed = started.elapsed().as_millis() as u64;

    let mut load_check = match &load_result {
        Ok(_) => VerificationCheck::passed(
            format!("ui: {}: page load", name),
            CheckType::Ui,
            format!("{} loaded", url),
            load_elapsed,
        ),
        Err(e) => VerificationCheck::failed(
            format!("ui: {}: page load", name),
            CheckType::Ui,
            format!("{} did not load", url),
            load_elapsed,
            e.to_string(),
        ),
    };

    if load_result.is_ok() {
        // Selector presence
        if let Some(selector) = &config.selector {
            let sel_started = Instant::now();
            match tab.find_element(selector) {
                Ok(_) => checks.push(VerificationCheck::passed(
                    format!("ui: {}: selector", name),
                    CheckType::Ui,
                    format!("selector '{}' present", selector),
                    sel_started.elapsed().as_millis() as u64,
                )),
                Err(e) => checks.push(VerificationCheck::failed(
                    format!("ui: {}: selector", name),
                    CheckType::Ui,
                    format!("selector '{}' absent", selector),
                    sel_started.elapsed().as_millis() as u64,
                    e.to_string(),
                )),
            }
        }

        // Text presence
        if let Some(expected) = &config.expected_text {
            let text_started = Instant::now();
            let found = tab
                .get_content()
                .map(|content| content.contains(expected))
                .unwrap_or(false);
            if found {
                checks.push(VerificationCheck::passed(
                    format!("ui: {}: text", name),
                    CheckType::Ui,
                    format!("page contains '{}'", expected),
                    text_started.elapsed().as_millis() as u64,
                ));
            } else {
                checks.push(VerificationCheck::failed(
                    format!("ui: {}: text", name),
                    CheckType::Ui,
                    format!("page does not contain '{}'", expected),
                    text_started.elapsed().as_millis() as u64,
                    "expected text missing",
                ));
            }
        }

        // Console errors: reload with the collector hook installed, then
        // read back whatever was collected during load
        let console_started = Instant::now();
        let console_errors = collect_console_errors(&tab);
        match console_errors {
            Ok(errors) if errors.is_empty() => checks.push(VerificationCheck::passed(
                format!("ui: {}: console", name),
                CheckType::Ui,
                "no console errors during load",
                console_started.elapsed().as_millis() as u64,
            )),
            Ok(errors) => checks.push(
                VerificationCheck::failed(
                    format!("ui: {}: console", name),
                    CheckType::Ui,
                    format!("{} console error(s) during load", errors.len()),
                    console_started.elapsed().as_millis() as u64,
                    errors.join("; "),
                )
                .with_metadata("consoleErrors", serde_json::json!(errors)),
            ),
            Err(e) => checks.push(VerificationCheck::failed(
                format!("ui: {}: console", name),
                CheckType::Ui,
                "could not read console errors",
                console_started.elapsed().as_millis() as u64,
                e,
            )),
        }

        // Diagnostic screenshot, attached to the page-load check
        if config.screenshot {
            match tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true) {
                Ok(bytes) => {
                    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
                    load_check = load_check
                        .with_metadata("screenshotPng", serde_json::json!(encoded));
                }
                Err(e) => {
                    debug!(error = %e, "screenshot capture failed");
                }
            }
        }
    }

    checks.insert(0, load_check);
    checks
}

fn collect_console_errors(tab: &headless_chrome::Tab) -> Result<Vec<String>, String> {
    tab.reload(false, Some(CONSOLE_HOOK))
        .and_then(|t| t.wait_until_navigated())
        .map_err(|e| e.to_string())?;

    // Give late async errors a moment to land
    std::thread::sleep(Duration::from_millis(500));

    let result = tab
        .evaluate(
            "JSON.stringify(window.__shipflowConsoleErrors || [])",
            false,
        )
        .map_err(|e| e.to_string())?;

    let serialized = result
        .value
        .and_then(|v| v.as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "[]".to_string());

    serde_json::from_str(&serialized).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str) -> UiCheckConfig {
        UiCheckConfig {
            name: name.to_string(),
            url: None,
            selector: Some("#app".to_string()),
            expected_text: None,
            screenshot: false,
        }
    }

    #[test]
    fn test_console_hook_is_valid_json_producer() {
        // The hook must at least parse as the empty collection it installs
        let parsed: Vec<String> = serde_json::from_str("[]").unwrap();
        assert!(parsed.is_empty());
        assert!(CONSOLE_HOOK.contains("__shipflowConsoleErrors"));
    }

    #[tokio::test]
    #[ignore] // Chromeのインストールが必要なため、通常のテストではスキップ
    async fn test_ui_check_against_real_page() {
        let checks = run_ui_check("https://example.com", &config("smoke")).await;
        assert!(!checks.is_empty());
        assert!(checks[0].name.contains("page load"));
    }

    #[tokio::test]
    async fn test_unreachable_url_reports_load_failure() {
        let mut cfg = config("offline");
        cfg.url = Some("http://127.0.0.1:9/".to_string());

        let checks = run_ui_check("http://127.0.0.1:9/", &cfg).await;
        // Either the browser is unavailable or the navigation failed -
        // both surface as a failed first check, never a crash
        assert!(!checks.is_empty());
        assert!(!checks[0].success);
    }
}
