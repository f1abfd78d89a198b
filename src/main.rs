//! jobsh — ジョブ制御付きシェルの REPL ループ。
//!
//! プロンプト表示 → 1行読み取り → 評価 → ループ。読み取り中に届いた
//! `SIGINT` は行を読み捨てて次のプロンプトへ戻るだけで、シェル自体は終了しない。
//! `SIGTSTP`/`SIGTTIN`/`SIGTTOU` は無視し、フォアグラウンドジョブにのみ作用させる。

mod builtins;
mod error;
mod executor;
mod job;
mod launcher;
mod monitor;
mod ops;
mod parser;
mod reaper;
mod redirect;
mod shell;
mod siggate;
mod terminal;

use std::io::{self, Write};

use tracing_subscriber::EnvFilter;

use error::ShellError;
use ops::Filter;
use shell::Shell;

extern "C" fn sigint_noop(_sig: libc::c_int) {}

/// 構造化ログを初期化する。`RUST_LOG` で上書きできる。ログは標準エラーへ
/// 出すため、シェルの通常出力（標準出力）とは混ざらない。
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_writer(std::io::stderr).with_env_filter(filter).init();
}

/// シェル自身のシグナル配置を整える。`SIGINT` は no-op ハンドラでブロッキング
/// `read(2)` を `EINTR` で打ち切るためだけに使う（`SA_RESTART` は立てない）。
/// `SIGTSTP`/`SIGTTIN`/`SIGTTOU` は無視し、フォアグラウンドプロセスグループの
/// 交代だけで制御されるようにする。
fn install_shell_signal_dispositions() {
    unsafe {
        let mut act: libc::sigaction = std::mem::zeroed();
        act.sa_sigaction = sigint_noop as usize;
        act.sa_flags = 0;
        libc::sigemptyset(&mut act.sa_mask);
        libc::sigaction(libc::SIGINT, &act, std::ptr::null_mut());

        libc::signal(libc::SIGTSTP, libc::SIG_IGN);
        libc::signal(libc::SIGTTIN, libc::SIG_IGN);
        libc::signal(libc::SIGTTOU, libc::SIG_IGN);
    }
}

enum Line {
    Text(String),
    Eof,
    Interrupted,
}

/// 標準入力から改行まで1バイトずつ読み取る。`std::io::Stdin::read_line` は
/// `EINTR` を内部でリトライしてしまい `SIGINT` で打ち切れないため、生の
/// `read(2)` を直接呼ぶ。
fn read_line() -> io::Result<Line> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        let n = unsafe { libc::read(libc::STDIN_FILENO, byte.as_mut_ptr() as *mut libc::c_void, 1) };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(Line::Interrupted);
            }
            return Err(err);
        }
        if n == 0 {
            if buf.is_empty() {
                return Ok(Line::Eof);
            }
            break;
        }
        if byte[0] == b'\n' {
            break;
        }
        buf.push(byte[0]);
    }

    Ok(Line::Text(String::from_utf8_lossy(&buf).into_owned()))
}

fn main() {
    init_logging();
    install_shell_signal_dispositions();

    let mut shell = match Shell::new() {
        Ok(shell) => shell,
        Err(ShellError::NotATty) => {
            eprintln!("jobsh: not running in an interactive terminal");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("jobsh: {}", e);
            std::process::exit(1);
        }
    };
    tracing::debug!(pgid = shell.pgid, "shell started");

    reaper::install(&mut shell.jobs);

    let stdout = io::stdout();
    let mut stdout = stdout.lock();

    loop {
        if shell.last_status == 0 {
            let _ = write!(stdout, "jobsh$ ");
        } else {
            let _ = write!(stdout, "[{}] jobsh$ ", shell.last_status);
        }
        let _ = stdout.flush();

        match read_line() {
            Ok(Line::Eof) => {
                let _ = writeln!(stdout);
                break;
            }
            Ok(Line::Interrupted) => {
                let _ = writeln!(stdout);
            }
            Ok(Line::Text(line)) => {
                executor::eval(&mut shell, &line);
                ops::report(&mut shell, Filter::Finished);
                if shell.should_exit {
                    break;
                }
            }
            Err(e) => {
                eprintln!("jobsh: read error: {}", e);
                break;
            }
        }
    }

    tracing::debug!("shell shutting down");
    ops::shutdown(&mut shell);
    std::process::exit(shell.last_status);
}
