//! リダイレクト抽出: パース済みコマンドのリダイレクト指定を実際のファイル
//! ディスクリプタへ変換する。
//!
//! 同じ方向に複数のリダイレクトが指定された場合は最後に開いたものを残し、
//! それ以前に開いたものは閉じる（`> a > b` は `b` だけが有効）。

use crate::parser::{Command, RedirectKind};
use std::ffi::CString;
use std::io;

/// 1コマンド分の解決済みリダイレクト先。
pub struct Redirection {
    pub input: Option<i32>,
    pub output: Option<i32>,
}

impl Redirection {
    pub fn none() -> Self {
        Self { input: None, output: None }
    }

    /// 開いたままの fd をすべて閉じる。
    pub fn close(&self) {
        if let Some(fd) = self.input {
            unsafe {
                libc::close(fd);
            }
        }
        if let Some(fd) = self.output {
            unsafe {
                libc::close(fd);
            }
        }
    }
}

/// `cmd` の `redirects` を開き、`(io::Error, 対象パス)` を除いて返す。
pub fn extract(cmd: &Command) -> Result<Redirection, (io::Error, String)> {
    let mut input = None;
    let mut output = None;

    for r in &cmd.redirects {
        let path = CString::new(r.target.as_bytes())
            .map_err(|_| (io::Error::from(io::ErrorKind::InvalidInput), r.target.to_string()))?;

        let (flags, mode, slot): (i32, libc::mode_t, &mut Option<i32>) = match r.kind {
            RedirectKind::Input => (libc::O_RDONLY, 0, &mut input),
            RedirectKind::Output => (libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC, 0o644, &mut output),
            RedirectKind::Append => (libc::O_WRONLY | libc::O_CREAT | libc::O_APPEND, 0o644, &mut output),
        };

        let fd = unsafe { libc::open(path.as_ptr(), flags, mode as libc::c_uint) };
        if fd < 0 {
            let err = io::Error::last_os_error();
            input.map(|fd| unsafe { libc::close(fd) });
            output.map(|fd| unsafe { libc::close(fd) });
            return Err((err, r.target.to_string()));
        }
        if let Some(old) = slot.replace(fd) {
            unsafe {
                libc::close(old);
            }
        }
    }

    Ok(Redirection { input, output })
}
