use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("コマンドが見つかりません: {0}\nヒント: PATH にインストールされているか確認してください")]
    CommandNotFound(String),

    #[error("コマンドが失敗しました: {command} (exit code {exit_code})\nstderr:\n{stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("コマンドがタイムアウトしました: {command} ({}秒)", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },

    #[error("コマンド起動エラー: {command}\n理由: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExecError>;
