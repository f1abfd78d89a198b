//! シグナルゲート: 「子プロセスイベントをブロック中」というプロセス全体の規約を提供する。
//!
//! ジョブテーブルへの読み書きはすべてこのゲートが作る臨界区間の内側で行う。
//! フォアグラウンドモニタとシャットダウン経路は `suspend` でのみ reaper の進展を待つ。
//! 素朴な「ブロック解除 → 待機」の2ステップは、reaper がハンドラを終えてから
//! 待機に入るまでの間に競合を生むため許されない。`sigsuspend` はこの解除と待機を
//! 1つのシステムコールにまとめ、アトミックにする。

use std::mem::MaybeUninit;

fn child_event_mask() -> libc::sigset_t {
    unsafe {
        let mut set = MaybeUninit::<libc::sigset_t>::uninit();
        libc::sigemptyset(set.as_mut_ptr());
        libc::sigaddset(set.as_mut_ptr(), libc::SIGCHLD);
        set.assume_init()
    }
}

/// 子プロセスイベントの配送をブロックし、直前のシグナルマスクを返す。
///
/// fork/addjob/addproc の三つ組、パイプライン構築、フォアグラウンドモニタの
/// 待機ループ、シャットダウンの各臨界区間の開始点で呼ぶ。
pub fn enter() -> libc::sigset_t {
    let mask = child_event_mask();
    unsafe {
        let mut old = MaybeUninit::<libc::sigset_t>::uninit();
        libc::sigprocmask(libc::SIG_BLOCK, &mask, old.as_mut_ptr());
        old.assume_init()
    }
}

/// `enter` が返したマスクを復元し、臨界区間を終える。
pub fn leave(old_mask: libc::sigset_t) {
    unsafe {
        libc::sigprocmask(libc::SIG_SETMASK, &old_mask, std::ptr::null_mut());
    }
}

/// 子プロセスイベントの配送を一時的に解除し、シグナルが1つ届くまで待ってから
/// 直前のマスクへ戻す。`mask` には `enter` が返した（子プロセスイベントを
/// ブロックしていない）マスクを渡す。
pub fn suspend(mask: &libc::sigset_t) {
    unsafe {
        libc::sigsuspend(mask);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_blocks_sigchld_and_leave_restores_mask() {
        unsafe {
            let mut before = MaybeUninit::<libc::sigset_t>::uninit();
            libc::sigprocmask(libc::SIG_SETMASK, std::ptr::null(), before.as_mut_ptr());
            let before = before.assume_init();
            assert_eq!(libc::sigismember(&before, libc::SIGCHLD), 0);

            let old = enter();
            let mut current = MaybeUninit::<libc::sigset_t>::uninit();
            libc::sigprocmask(libc::SIG_SETMASK, std::ptr::null(), current.as_mut_ptr());
            let current = current.assume_init();
            assert_eq!(libc::sigismember(&current, libc::SIGCHLD), 1);

            leave(old);
            let mut after = MaybeUninit::<libc::sigset_t>::uninit();
            libc::sigprocmask(libc::SIG_SETMASK, std::ptr::null(), after.as_mut_ptr());
            let after = after.assume_init();
            assert_eq!(libc::sigismember(&after, libc::SIGCHLD), 0);
        }
    }
}
