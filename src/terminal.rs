//! ターミナルアービタ: 制御端末の「フォアグラウンドプロセスグループ」属性と
//! 端末モード (termios) の所有権を、シェルとジョブの間で受け渡しする。
//!
//! 端末は close-on-exec にした複製 fd 経由で操作する。標準入力そのものの fd を
//! 直接使うと、子プロセスに継承されてしまい片付けが面倒になるため。

use crate::error::{Result, ShellError};
use crate::job::Job;

/// `tcsetattr` の適用方法。
#[derive(Clone, Copy)]
pub enum RestoreMode {
    /// `TCSADRAIN` — 出力済みのデータが送出されてから適用。
    Drain,
    /// `TCSAFLUSH` — 出力済みデータの送出を待ち、かつ未読の入力を捨ててから適用。
    Flush,
}

pub struct TerminalArbiter {
    fd: i32,
    /// シェル自身の端末モード。起動時に保存し、フォアグラウンドへ戻るたびに復元する。
    pub shell_modes: libc::termios,
}

impl TerminalArbiter {
    /// 標準入力を複製し、close-on-exec を立てた上でシェル自身のプロセスグループを
    /// フォアグラウンドに設定し、現在の端末モードを保存する。
    pub fn new() -> Result<Self> {
        let dup_fd = unsafe { libc::dup(libc::STDIN_FILENO) };
        if dup_fd < 0 {
            return Err(ShellError::NotATty);
        }
        unsafe {
            libc::fcntl(dup_fd, libc::F_SETFD, libc::FD_CLOEXEC);
        }

        let pgid = unsafe { libc::getpgrp() };
        unsafe {
            libc::tcsetpgrp(dup_fd, pgid);
        }

        let mut modes: libc::termios = unsafe { std::mem::zeroed() };
        unsafe {
            libc::tcgetattr(dup_fd, &mut modes);
        }

        Ok(Self { fd: dup_fd, shell_modes: modes })
    }

    /// 端末のフォアグラウンドプロセスグループを `pgid` にする。
    pub fn set_foreground_group(&self, pgid: libc::pid_t) {
        unsafe {
            libc::tcsetpgrp(self.fd, pgid);
        }
    }

    /// 現在の端末モードをシェルの保存領域へ記録し、`job` に保存されたモードを
    /// drain セマンティクスで適用する。ジョブをフォアグラウンドに迎える際に使う。
    pub fn save_and_apply(&mut self, job: &Job) {
        unsafe {
            libc::tcgetattr(self.fd, &mut self.shell_modes);
            libc::tcsetattr(self.fd, libc::TCSADRAIN, &job.tmodes);
        }
    }

    /// 現在の端末モードを `job` へ保存する（適用は行わない）。
    /// ジョブが SIGTSTP 等で停止し、バックグラウンドへ退避する際に使う。
    pub fn snapshot_into(&self, job: &mut Job) {
        unsafe {
            libc::tcgetattr(self.fd, &mut job.tmodes);
        }
    }

    /// シェル自身の保存済みモードを適用する。
    pub fn restore_shell(&self, how: RestoreMode) {
        let action = match how {
            RestoreMode::Drain => libc::TCSADRAIN,
            RestoreMode::Flush => libc::TCSAFLUSH,
        };
        unsafe {
            libc::tcsetattr(self.fd, action, &self.shell_modes);
        }
    }

    /// 複製した端末 fd を閉じる。シャットダウンの最終ステップで呼ぶ。
    pub fn close(&mut self) {
        if self.fd >= 0 {
            unsafe {
                libc::close(self.fd);
            }
            self.fd = -1;
        }
    }
}
