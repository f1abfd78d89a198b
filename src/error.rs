//! 致命的エラー型。
//!
//! fork・パイプ生成・端末初期化などシェル自体の継続が不可能な失敗を表す。
//! 個々のコマンドの失敗（exec 失敗、リダイレクト対象が開けない等）は
//! 終了ステータスとして処理され、ここには含めない。

use std::io;
use thiserror::Error;

/// シェルの継続を妨げる致命的エラー。
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("stdin is not a terminal")]
    NotATty,
    #[error("fork failed: {0}")]
    Fork(#[source] io::Error),
    #[error("pipe failed: {0}")]
    Pipe(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, ShellError>;
