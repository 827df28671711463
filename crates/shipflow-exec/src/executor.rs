//! コマンド実行の実装

use crate::error::{ExecError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::sleep;
use tracing::debug;

/// コマンド実行オプション
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// 作業ディレクトリ（省略時はカレント）
    pub cwd: Option<PathBuf>,

    /// 子プロセスへ追加で渡す環境変数
    pub env: HashMap<String, String>,

    /// タイムアウト。超過時はプロセスをkillして `ExecError::Timeout`
    pub timeout: Duration,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            cwd: None,
            env: HashMap::new(),
            timeout: Duration::from_secs(600),
        }
    }
}

impl ExecOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }
}

/// コマンド実行結果
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

/// コマンドを実行し、出力をキャプチャして返す
///
/// stdout/stderr は行単位でストリーム読みし、キャプチャと同時に
/// `tracing::debug!` へ流します。非ゼロ終了は `ExecError::CommandFailed`。
pub async fn execute(command: &str, args: &[&str], options: &ExecOptions) -> Result<ExecOutput> {
    let started = Instant::now();
    let cmd_display = format_command(command, args);
    debug!(command = %cmd_display, "コマンドを実行");

    let mut cmd = Command::new(command);
    cmd.args(args);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(Stdio::null());
    cmd.kill_on_drop(true);

    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }
    for (key, value) in &options.env {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ExecError::CommandNotFound(command.to_string())
        } else {
            ExecError::Spawn {
                command: cmd_display.clone(),
                source: e,
            }
        }
    })?;

    // 行単位でストリーム読みしながらキャプチャ
    let stdout_pipe = child.stdout.take().expect("stdout is piped");
    let stderr_pipe = child.stderr.take().expect("stderr is piped");

    let stdout_task = tokio::spawn(read_lines(stdout_pipe, false));
    let stderr_task = tokio::spawn(read_lines(stderr_pipe, true));

    let status = match tokio::time::timeout(options.timeout, child.wait()).await {
        Ok(status) => status?,
        Err(_) => {
            // タイムアウト: 子プロセスをkillして失敗として返す
            child.kill().await.ok();
            stdout_task.abort();
            stderr_task.abort();
            return Err(ExecError::Timeout {
                command: cmd_display,
                timeout: options.timeout,
            });
        }
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();
    let duration = started.elapsed();

    let exit_code = status.code().unwrap_or(-1);
    if !status.success() {
        return Err(ExecError::CommandFailed {
            command: cmd_display,
            exit_code,
            stdout,
            stderr,
        });
    }

    debug!(
        command = %cmd_display,
        exit_code,
        duration_ms = duration.as_millis() as u64,
        "コマンド完了"
    );

    Ok(ExecOutput {
        exit_code,
        stdout,
        stderr,
        duration,
    })
}

/// シェル経由でコマンド文字列を実行（"npm run build" 等の設定値向け）
pub async fn execute_shell(script: &str, options: &ExecOptions) -> Result<ExecOutput> {
    execute("sh", &["-c", script], options).await
}

/// 固定ディレイでリトライ付き実行
///
/// 全試行が失敗した場合は最後のエラーを返します。
pub async fn execute_with_retry(
    command: &str,
    args: &[&str],
    options: &ExecOptions,
    attempts: u32,
    delay: Duration,
) -> Result<ExecOutput> {
    let attempts = attempts.max(1);
    let mut last_error = None;

    for attempt in 0..attempts {
        match execute(command, args, options).await {
            Ok(output) => return Ok(output),
            Err(e) => {
                debug!(
                    command,
                    attempt = attempt + 1,
                    attempts,
                    error = %e,
                    "コマンド失敗"
                );
                last_error = Some(e);
            }
        }

        // 最後の試行でなければ待機
        if attempt + 1 < attempts {
            sleep(delay).await;
        }
    }

    Err(last_error.expect("attempts >= 1"))
}

/// コマンドがPATH上に存在するか確認
pub async fn command_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

async fn read_lines(
    pipe: impl tokio::io::AsyncRead + Unpin,
    is_stderr: bool,
) -> String {
    let mut reader = BufReader::new(pipe).lines();
    let mut captured = String::new();

    while let Ok(Some(line)) = reader.next_line().await {
        if is_stderr {
            debug!(stream = "stderr", "{}", line);
        } else {
            debug!(stream = "stdout", "{}", line);
        }
        captured.push_str(&line);
        captured.push('\n');
    }

    captured
}

fn format_command(command: &str, args: &[&str]) -> String {
    if args.is_empty() {
        command.to_string()
    } else {
        format!("{} {}", command, args.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_execute_captures_stdout() {
        let output = execute("echo", &["hello"], &ExecOptions::default())
            .await
            .unwrap();

        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout.trim(), "hello");
        assert!(output.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_execute_nonzero_exit() {
        let err = execute("sh", &["-c", "echo boom >&2; exit 3"], &ExecOptions::default())
            .await
            .unwrap_err();

        match err {
            ExecError::CommandFailed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, 3);
                assert!(stderr.contains("boom"));
            }
            other => panic!("CommandFailedを期待しましたが: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_command_not_found() {
        let err = execute(
            "definitely-not-a-command-12345",
            &[],
            &ExecOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ExecError::CommandNotFound(_)));
    }

    #[tokio::test]
    async fn test_execute_timeout_kills_process() {
        let options = ExecOptions::with_timeout(Duration::from_millis(200));
        let started = Instant::now();
        let err = execute("sleep", &["5"], &options).await.unwrap_err();

        assert!(matches!(err, ExecError::Timeout { .. }));
        // sleepの完了を待っていないこと
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_execute_with_cwd_and_env() {
        let temp_dir = tempfile::tempdir().unwrap();
        let options = ExecOptions {
            cwd: Some(temp_dir.path().to_path_buf()),
            env: HashMap::from([("SHIPFLOW_TEST_VAR".to_string(), "abc".to_string())]),
            ..Default::default()
        };

        let output = execute("sh", &["-c", "pwd && echo $SHIPFLOW_TEST_VAR"], &options)
            .await
            .unwrap();

        assert!(output.stdout.contains("abc"));
    }

    #[tokio::test]
    async fn test_retry_surfaces_last_error() {
        let started = Instant::now();
        let err = execute_with_retry(
            "sh",
            &["-c", "exit 1"],
            &ExecOptions::default(),
            3,
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ExecError::CommandFailed { exit_code: 1, .. }));
        // 2回分のディレイが挟まっていること
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failure() {
        let temp_dir = tempfile::tempdir().unwrap();
        let marker = temp_dir.path().join("marker");
        // 1回目は失敗し、markerを作った2回目以降は成功するスクリプト
        let script = format!(
            "if [ -f {m} ]; then exit 0; else touch {m}; exit 1; fi",
            m = marker.display()
        );

        let output = execute_with_retry(
            "sh",
            &["-c", &script],
            &ExecOptions::default(),
            3,
            Duration::from_millis(10),
        )
        .await
        .unwrap();

        assert_eq!(output.exit_code, 0);
    }

    #[tokio::test]
    async fn test_command_exists() {
        assert!(command_exists("sh").await);
        assert!(!command_exists("definitely-not-a-command-12345").await);
    }

    #[tokio::test]
    async fn test_execute_shell() {
        let output = execute_shell("echo shell-test", &ExecOptions::default())
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "shell-test");
    }
}
