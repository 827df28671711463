//! 外部コマンド実行モジュール
//!
//! ビルド・デプロイで使う外部コマンドを、タイムアウト・リトライ・
//! 出力キャプチャ付きで実行します。呼び出し単位では同期的な抽象で、
//! 並列化は呼び出し側が独立した呼び出しを並べることで行います。

pub mod error;
mod executor;

pub use error::{ExecError, Result};
pub use executor::{
    command_exists, execute, execute_shell, execute_with_retry, ExecOptions, ExecOutput,
};
