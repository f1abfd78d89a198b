//! フォアグラウンドモニタ: フォアグラウンドスロットのジョブが停止または完了する
//! まで `SIGCHLD` を待ち、端末の所有権をシェルへ返す。
//!
//! シグナルゲートの中で `sigsuspend` により待機する。チェックと待機の間に
//! レースが起きないよう、マスクの変更と一時解除を単一の原子的操作にまとめる。

use crate::job::{self, JobState};
use crate::shell::Shell;
use crate::siggate;
use crate::terminal::RestoreMode;

/// フォアグラウンドスロット `slot` のジョブを見届ける。
///
/// 1. シグナルゲートに入る
/// 2. 端末モードを適用し、端末のフォアグラウンドプロセスグループをジョブへ渡す
/// 3. ジョブへ `SIGCONT` を送る（新規起動直後のジョブは no-op）
/// 4. `SIGCHLD` を待ちながらジョブの状態を問い合わせる
/// 5. 停止なら端末モードを退避してバックグラウンドスロットへ移す。完了なら
///    終了コードを得る
/// 6. 端末のフォアグラウンドプロセスグループをシェルへ戻し、シェルの端末
///    モードを復元し、シグナルゲートを抜ける
pub fn run(shell: &mut Shell, slot: usize) -> i32 {
    let old_mask = siggate::enter();

    let Some(job) = shell.jobs.get(slot) else {
        siggate::leave(old_mask);
        return 0;
    };
    let pgid = job.pgid;
    shell.terminal.save_and_apply(job);
    shell.terminal.set_foreground_group(pgid);
    unsafe {
        libc::kill(-pgid, libc::SIGCONT);
    }

    let code = loop {
        match shell.jobs.job_state(slot) {
            Some((JobState::Stopped, _)) => {
                if let Some(job) = shell.jobs.get_mut(slot) {
                    shell.terminal.snapshot_into(job);
                }
                let bg = shell.jobs.allocate_background();
                shell.jobs.mv(slot, bg);
                let command = shell.jobs.get(bg).map(|j| j.command.clone()).unwrap_or_default();
                eprintln!("[{}] suspended '{}'", bg, command);
                break 0;
            }
            Some((JobState::Finished, raw)) => {
                break raw.map(job::decode_exit_code).unwrap_or(0);
            }
            Some((JobState::Running, _)) => {
                siggate::suspend(&old_mask);
            }
            None => break 0,
        }
    };

    shell.terminal.set_foreground_group(shell.pgid);
    shell.terminal.restore_shell(RestoreMode::Flush);
    siggate::leave(old_mask);
    code
}
