//! 子プロセスイベントの非同期ハンドラ。`SIGCHLD` 配送のたびに起動され、
//! ジョブテーブル中の未完了プロセスを非ブロッキングで poll して状態を反映する。
//!
//! ## async-signal-safety の制約
//!
//! このハンドラはメモリを確保せず、シグナルマスキング以外のロックを取らず、
//! 非同期シグナルセーフでない I/O を行わない。エラー報告は固定長メッセージの
//! 生の `write(2)` のみで行う（`format!`/`eprintln!` はアロケーションを伴うため使えない）。

use crate::job::{JobState, JobTable, ProcState};
use std::sync::atomic::{AtomicPtr, Ordering};

static TABLE: AtomicPtr<JobTable> = AtomicPtr::new(std::ptr::null_mut());

#[cfg(target_os = "macos")]
unsafe fn errno_location() -> *mut i32 {
    libc::__error()
}
#[cfg(not(target_os = "macos"))]
unsafe fn errno_location() -> *mut i32 {
    libc::__errno_location()
}

/// ハンドラが呼び出し元の `errno` を壊さないよう、退出時に元の値を復元する。
struct ErrnoGuard(i32);

impl Drop for ErrnoGuard {
    fn drop(&mut self) {
        unsafe {
            *errno_location() = self.0;
        }
    }
}

extern "C" fn handler(_sig: libc::c_int) {
    let _errno_guard = ErrnoGuard(unsafe { *errno_location() });

    let table_ptr = TABLE.load(Ordering::SeqCst);
    if table_ptr.is_null() {
        return;
    }
    let table = unsafe { &mut *table_ptr };

    unsafe {
        let mut mask: libc::sigset_t = std::mem::zeroed();
        let mut old: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut mask);
        libc::sigaddset(&mut mask, libc::SIGCHLD);
        libc::sigprocmask(libc::SIG_BLOCK, &mask, &mut old);

        for slot in 0..table.len() {
            reap_slot(table, slot);
        }

        libc::sigprocmask(libc::SIG_SETMASK, &old, std::ptr::null_mut());
    }
}

fn reap_slot(table: &mut JobTable, slot: usize) {
    let pids: Vec<libc::pid_t> = match table.get(slot) {
        Some(job) if job.state() != JobState::Finished => job
            .processes
            .iter()
            .filter(|p| p.state != ProcState::Finished)
            .map(|p| p.pid)
            .collect(),
        _ => return,
    };

    for pid in pids {
        let mut status: i32 = 0;
        let ret = unsafe { libc::waitpid(pid, &mut status, libc::WNOHANG | libc::WUNTRACED | libc::WCONTINUED) };
        match ret {
            0 => continue, // まだ状態変化なし
            -1 => {
                // errno == ECHILD は他所で既に reap 済みという良性のレースとして扱う
                // （waitpid(-1, ...) の同時実行や二重 reap など）。それ以外は警告する。
                if unsafe { *errno_location() } != libc::ECHILD {
                    const MSG: &[u8] = b"jobsh: waitpid failed in sigchld handler\n";
                    unsafe {
                        libc::write(libc::STDERR_FILENO, MSG.as_ptr() as *const libc::c_void, MSG.len());
                    }
                }
            }
            _ => table.mark_pid(pid, status),
        }
    }
}

/// reaper をインストールする。`table` は以後プロセスの存続期間中アドレスが
/// 変わらないこと（`Shell` が保持する `JobTable` のフィールドを指す等）が前提。
pub fn install(table: &mut JobTable) {
    TABLE.store(table as *mut JobTable, Ordering::SeqCst);

    let mut act: libc::sigaction = unsafe { std::mem::zeroed() };
    act.sa_sigaction = handler as usize;
    act.sa_flags = libc::SA_RESTART;
    unsafe {
        libc::sigemptyset(&mut act.sa_mask);
        libc::sigaddset(&mut act.sa_mask, libc::SIGINT);
        libc::sigaction(libc::SIGCHLD, &act, std::ptr::null_mut());
    }
}
