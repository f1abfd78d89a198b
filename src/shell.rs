//! シェルのグローバル状態: ジョブテーブル、ターミナルアービタ、自身のプロセス
//! グループ、直前の終了ステータスをまとめて保持する。

use crate::error::{Result, ShellError};
use crate::job::JobTable;
use crate::terminal::TerminalArbiter;

/// シェルの実行状態。REPL ループ全体で共有される。
pub struct Shell {
    pub jobs: JobTable,
    pub terminal: TerminalArbiter,
    /// シェル自身のプロセスグループ ID。ジョブ終了後に端末を取り戻す先。
    pub pgid: libc::pid_t,
    /// 直前のコマンド（パイプラインなら最終ステージ）の終了ステータス。
    pub last_status: i32,
    /// `exit` ビルトインで true にセットされ、REPL ループを終了させる。
    pub should_exit: bool,
}

impl Shell {
    /// シェルの起動手続きを行う: 標準入力が端末であることを確認し、必要なら
    /// 自身のプロセスグループを立て、ジョブテーブルとターミナルアービタを用意する。
    pub fn new() -> Result<Self> {
        if unsafe { libc::isatty(libc::STDIN_FILENO) } == 0 {
            return Err(ShellError::NotATty);
        }

        unsafe {
            if libc::getsid(0) != libc::getpgid(0) {
                libc::setpgid(0, 0);
            }
        }

        let jobs = JobTable::new();
        let terminal = TerminalArbiter::new()?;
        let pgid = unsafe { libc::getpgrp() };

        Ok(Self {
            jobs,
            terminal,
            pgid,
            last_status: 0,
            should_exit: false,
        })
    }
}
