//! パイプラインランチャー: パース済みパイプラインからプロセスグループを立ち上げ、
//! ジョブテーブルへ登録する。
//!
//! パイプラインの各ステージは fork する。ビルトインも外部コマンドと同じ子
//! プロセスの中で実行する — パイプの途中や末尾のビルトインは自分のプロセスが
//! 持つ標準入出力にしか影響しないのが自然な挙動だから。唯一の例外は「単独の
//! フォアグラウンドコマンドがビルトインである」場合で、このときは fork せず
//! シェル自身のプロセスで直接実行する（`cd`/`exit`/`export` がシェルの状態を
//! 書き換えられるようにするため）。
//!
//! fork からジョブテーブルへの登録 (`add_job`/`add_process`) まではシグナル
//! ゲートの中で行う。その間に届く `SIGCHLD` は reaper のハンドラ内で
//! 読み飛ばされず、ゲートを抜けた直後の `sigsuspend` で確実に拾われる。

use std::ffi::CString;
use std::fs::File;
use std::io::{self, Write};
use std::os::unix::io::FromRawFd;

use crate::builtins;
use crate::error::ShellError;
use crate::monitor;
use crate::ops::Placement;
use crate::parser::{Command, Pipeline};
use crate::redirect::{self, Redirection};
use crate::shell::Shell;
use crate::siggate;

/// fork/pipe の失敗はシェルプロセス自体の継続を諦める。途中まで起動した
/// ステージには `SIGKILL` を送ってから終了する。
fn die(old_mask: libc::sigset_t, pids: &[libc::pid_t], err: ShellError) -> ! {
    for pid in pids {
        unsafe {
            libc::kill(-*pid, libc::SIGKILL);
        }
    }
    eprintln!("jobsh: {}", err);
    siggate::leave(old_mask);
    std::process::exit(1);
}

/// パイプラインを実行する。単独のフォアグラウンドビルトインはシェルの
/// プロセス内で直接実行し、それ以外はジョブとして起動する。
pub fn launch(shell: &mut Shell, pipeline: &Pipeline<'_>, placement: Placement) -> i32 {
    if pipeline.commands.len() == 1 && placement == Placement::Foreground {
        let cmd = &pipeline.commands[0];
        let args: Vec<&str> = cmd.args.iter().map(|a| a.as_ref()).collect();
        if builtins::is_builtin(args[0]) {
            return run_builtin_inline(shell, cmd, &args);
        }
    }

    run_as_job(shell, pipeline, placement)
}

/// 単独のビルトインを fork せずシェル自身の中で実行する。
/// 出力リダイレクトはビルトインの `stdout` writer 差し替えで対応する。
fn run_builtin_inline(shell: &mut Shell, cmd: &Command<'_>, args: &[&str]) -> i32 {
    let redir = match redirect::extract(cmd) {
        Ok(r) => r,
        Err((err, path)) => {
            eprintln!("jobsh: {}: {}", path, err);
            return 1;
        }
    };

    let mut stdout_handle = std::io::stdout();
    let mut file_writer;
    let writer: &mut dyn Write = match redir.output {
        Some(fd) => {
            file_writer = unsafe { File::from_raw_fd(fd) };
            &mut file_writer
        }
        None => &mut stdout_handle,
    };

    let status = builtins::try_exec(shell, args, writer).unwrap_or(0);

    if let Some(fd) = redir.input {
        unsafe {
            libc::close(fd);
        }
    }
    status
}

/// `pipe(2)` を作り、両端へ close-on-exec を立てる。失敗はシェル自体の
/// 継続を諦める致命的エラーとして扱う（呼び出し元で `die` する）。
fn make_pipe() -> Result<(i32, i32), ShellError> {
    let mut fds = [0i32; 2];
    unsafe {
        if libc::pipe(fds.as_mut_ptr()) < 0 {
            return Err(ShellError::Pipe(io::Error::last_os_error()));
        }
        libc::fcntl(fds[0], libc::F_SETFD, libc::FD_CLOEXEC);
        libc::fcntl(fds[1], libc::F_SETFD, libc::FD_CLOEXEC);
    }
    Ok((fds[0], fds[1]))
}

/// 子プロセス側でジョブ制御用シグナルをデフォルトへ戻す。
fn reset_job_control_signals() {
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_DFL);
        libc::signal(libc::SIGTSTP, libc::SIG_DFL);
        libc::signal(libc::SIGTTIN, libc::SIG_DFL);
        libc::signal(libc::SIGTTOU, libc::SIG_DFL);
    }
}

/// 子プロセス側でシグナルマスクを全解除する。fork 直前にシェルが
/// ブロックしていた `SIGCHLD` 等を引き継がないようにする。
fn unblock_all_signals() {
    unsafe {
        let mut empty: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut empty);
        libc::sigprocmask(libc::SIG_SETMASK, &empty, std::ptr::null_mut());
    }
}

/// パイプ接続と明示的リダイレクトを子プロセスの標準入出力へ適用する。
/// 同じ方向について両方指定されていれば明示的リダイレクトが勝つ。
/// 使われなかった fd も含め、渡された fd はすべてここで閉じる。
fn apply_redirection(pipe_in: Option<i32>, pipe_out: Option<i32>, redir: &Redirection) {
    let input = redir.input.or(pipe_in);
    let output = redir.output.or(pipe_out);

    if let Some(fd) = input {
        unsafe {
            libc::dup2(fd, libc::STDIN_FILENO);
        }
    }
    if let Some(fd) = output {
        unsafe {
            libc::dup2(fd, libc::STDOUT_FILENO);
        }
    }

    for fd in [pipe_in, pipe_out, redir.input, redir.output].into_iter().flatten() {
        if fd != libc::STDIN_FILENO && fd != libc::STDOUT_FILENO {
            unsafe {
                libc::close(fd);
            }
        }
    }
}

/// `execvp` で外部コマンドに置き換わる。戻ってきた場合は失敗なので、
/// errno に応じた終了コードでこのプロセスを終える。
fn exec_external(args: &[&str]) -> ! {
    let cstrings: Vec<CString> = args
        .iter()
        .map(|a| CString::new(*a).unwrap_or_else(|_| CString::new("").unwrap()))
        .collect();
    let mut argv: Vec<*mut libc::c_char> = cstrings.iter().map(|c| c.as_ptr() as *mut libc::c_char).collect();
    argv.push(std::ptr::null_mut());

    unsafe {
        libc::execvp(argv[0] as *const libc::c_char, argv.as_ptr() as *const *const libc::c_char);
    }

    let err = std::io::Error::last_os_error();
    let (code, msg): (i32, String) = match err.raw_os_error() {
        Some(libc::ENOENT) => (127, "command not found".to_string()),
        Some(libc::EACCES) => (126, "permission denied".to_string()),
        _ => (1, err.to_string()),
    };
    eprintln!("jobsh: {}: {}", args[0], msg);
    unsafe {
        libc::_exit(code);
    }
}

/// 1ステージ分を子プロセスの中で実行する。ビルトインならそのまま終了コードで
/// `_exit` し、そうでなければ `execvp` に置き換わる。戻らない。
fn run_stage_in_child(shell: &mut Shell, args: &[&str]) -> ! {
    if builtins::is_builtin(args[0]) {
        let mut stdout = std::io::stdout();
        let status = builtins::try_exec(shell, args, &mut stdout).unwrap_or(0);
        unsafe {
            libc::_exit(status);
        }
    }
    exec_external(args)
}

/// パイプラインをジョブとして起動する。各ステージを fork し、同じプロセス
/// グループへまとめてから、ジョブテーブルへ1つのジョブとして登録する。
fn run_as_job(shell: &mut Shell, pipeline: &Pipeline<'_>, placement: Placement) -> i32 {
    let old_mask = siggate::enter();

    let n = pipeline.commands.len();
    let mut pgid: libc::pid_t = 0;
    let mut pids: Vec<libc::pid_t> = Vec::with_capacity(n);
    let mut next_input: Option<i32> = None;

    for (i, cmd) in pipeline.commands.iter().enumerate() {
        let args: Vec<&str> = cmd.args.iter().map(|a| a.as_ref()).collect();

        let redir = match redirect::extract(cmd) {
            Ok(r) => r,
            Err((err, path)) => {
                eprintln!("jobsh: {}: {}", path, err);
                for pid in &pids {
                    unsafe {
                        libc::kill(-*pid, libc::SIGKILL);
                    }
                }
                siggate::leave(old_mask);
                return 1;
            }
        };

        let input = next_input.take();
        let output = if i + 1 < n {
            let (r, w) = match make_pipe() {
                Ok(ends) => ends,
                Err(e) => {
                    redir.close();
                    die(old_mask, &pids, e);
                }
            };
            next_input = Some(r);
            Some(w)
        } else {
            None
        };

        let pid = unsafe { libc::fork() };
        match pid {
            -1 => {
                let err = io::Error::last_os_error();
                if let Some(fd) = input {
                    unsafe {
                        libc::close(fd);
                    }
                }
                if let Some(fd) = output {
                    unsafe {
                        libc::close(fd);
                    }
                }
                redir.close();
                tracing::warn!(stage = i, started = pids.len(), "fork failed mid-pipeline, tearing down already-launched stages");
                die(old_mask, &pids, ShellError::Fork(err));
            }
            0 => {
                unsafe {
                    libc::setpgid(0, pgid);
                }
                apply_redirection(input, output, &redir);
                reset_job_control_signals();
                unblock_all_signals();
                run_stage_in_child(shell, &args);
            }
            child => {
                if pgid == 0 {
                    pgid = child;
                }
                unsafe {
                    libc::setpgid(child, pgid);
                }
                if let Some(fd) = input {
                    unsafe {
                        libc::close(fd);
                    }
                }
                if let Some(fd) = output {
                    unsafe {
                        libc::close(fd);
                    }
                }
                redir.close();
                pids.push(child);
            }
        }
    }

    let slot = match placement {
        Placement::Foreground => shell.jobs.allocate_foreground(),
        Placement::Background => shell.jobs.allocate_background(),
    };
    shell.jobs.add_job(slot, pgid, shell.terminal.shell_modes);
    for (cmd, pid) in pipeline.commands.iter().zip(pids.iter()) {
        let args: Vec<&str> = cmd.args.iter().map(|a| a.as_ref()).collect();
        shell.jobs.add_process(slot, *pid, &args);
    }

    match placement {
        Placement::Foreground => {
            let code = monitor::run(shell, slot);
            siggate::leave(old_mask);
            code
        }
        Placement::Background => {
            let command = shell.jobs.get(slot).map(|j| j.command.clone()).unwrap_or_default();
            eprintln!("[{}] running '{}'", slot, command);
            siggate::leave(old_mask);
            0
        }
    }
}
