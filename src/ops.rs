//! ジョブ制御オペレーション: `resume` (fg/bg)・`kill`・`report` (jobs)・`shutdown`。
//!
//! いずれもジョブテーブルを変更する前後で [`siggate`] の臨界区間に入る。

use crate::job::{self, JobState};
use crate::monitor;
use crate::shell::Shell;
use crate::siggate;
use crate::terminal::RestoreMode;

/// 既存ジョブをどちらの位置で再開するか。
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Foreground,
    Background,
}

/// `jobs` の表示対象フィルタ。
#[derive(Clone, Copy)]
pub enum Filter {
    All,
    Finished,
}

/// `fg`/`bg`: 指定ジョブ（`None` なら最新の未完了バックグラウンドジョブ）を
/// `placement` で再開する。ジョブが存在しないか既に完了していれば `None`。
///
/// フォアグラウンドへの再開は、モニタが返す終了コードをそのまま返す。
/// バックグラウンドへの継続は成功時に `Some(0)` を返す。
pub fn resume(shell: &mut Shell, target: Option<usize>, placement: Placement) -> Option<i32> {
    let slot = target.or_else(|| shell.jobs.current_job_id())?;
    let job = shell.jobs.get(slot)?;
    if job.state() == JobState::Finished {
        return None;
    }
    let pgid = job.pgid;
    let command = job.command.clone();

    match placement {
        Placement::Foreground => {
            if slot != job::FOREGROUND {
                shell.jobs.mv(slot, job::FOREGROUND);
            }
            eprintln!("continue '{}'", command);
            unsafe {
                libc::kill(-pgid, libc::SIGCONT);
            }
            Some(monitor::run(shell, job::FOREGROUND))
        }
        Placement::Background => {
            unsafe {
                libc::kill(-pgid, libc::SIGCONT);
            }
            Some(0)
        }
    }
}

/// `kill %N`: ジョブを終了させる。停止中であれば一時的にフォアグラウンドへ
/// 迎え入れてから `SIGTERM` + `SIGCONT` を送り、端末をシェルへ戻す。
/// ジョブが存在しないか既に完了していれば `false`。
pub fn kill(shell: &mut Shell, slot: usize) -> bool {
    let Some(job) = shell.jobs.get(slot) else { return false };
    if job.state() == JobState::Finished {
        return false;
    }
    let pgid = job.pgid;
    let was_stopped = job.state() == JobState::Stopped;

    if was_stopped {
        let job = shell.jobs.get(slot).unwrap();
        shell.terminal.save_and_apply(job);
        shell.terminal.set_foreground_group(pgid);
    }

    unsafe {
        libc::kill(-pgid, libc::SIGTERM);
        libc::kill(-pgid, libc::SIGCONT);
    }

    if was_stopped {
        shell.terminal.set_foreground_group(shell.pgid);
        shell.terminal.restore_shell(RestoreMode::Drain);
    }

    true
}

/// `jobs`: 占有されたバックグラウンドスロット (index >= 1) を走査し、フィルタに
/// 合致するものを報告する。`Finished` なジョブはこの呼び出しの中で reap される。
pub fn report(shell: &mut Shell, filter: Filter) {
    let slots: Vec<usize> = shell.jobs.occupied().collect();
    for slot in slots {
        let Some(job) = shell.jobs.get(slot) else { continue };
        let state = job.state();
        let command = job.command.clone();

        let show = match filter {
            Filter::All => true,
            Filter::Finished => state == JobState::Finished,
        };
        if !show {
            continue;
        }

        match shell.jobs.job_state(slot) {
            Some((JobState::Finished, Some(raw))) => {
                if libc::WIFSIGNALED(raw) {
                    eprintln!("[{}] killed '{}' by signal {}", slot, command, libc::WTERMSIG(raw));
                } else {
                    eprintln!("[{}] exited '{}', status={}", slot, command, libc::WEXITSTATUS(raw));
                }
            }
            Some((JobState::Stopped, _)) => eprintln!("[{}] suspended '{}'", slot, command),
            Some((JobState::Running, _)) => eprintln!("[{}] running '{}'", slot, command),
            None => {}
        }
    }
}

/// シェル終了処理: 残っている全ジョブに終了シグナルを送り、reaper の進展を
/// 待ってから完了を報告し、最後に端末ディスクリプタを閉じる。
pub fn shutdown(shell: &mut Shell) {
    let old_mask = siggate::enter();

    let slots: Vec<usize> = (0..shell.jobs.len()).collect();
    for slot in slots {
        while let Some(job) = shell.jobs.get(slot) {
            if job.state() == JobState::Finished {
                break;
            }
            kill(shell, slot);
            siggate::suspend(&old_mask);
        }
    }

    report(shell, Filter::Finished);
    siggate::leave(old_mask);
    shell.terminal.close();
}
