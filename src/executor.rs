//! 1行分の評価: パースしてパイプラインランチャーへ渡し、`last_status` を更新する。

use crate::launcher;
use crate::ops::Placement;
use crate::parser;
use crate::shell::Shell;

/// 入力行を評価する。空行・コメントのみの行は何もせず直前のステータスを保つ。
/// パースエラーはシェルを落とさず、メッセージを出して非ゼロで終える。
pub fn eval(shell: &mut Shell, line: &str) {
    let pipeline = match parser::parse(line) {
        Ok(Some(p)) => p,
        Ok(None) => return,
        Err(e) => {
            eprintln!("jobsh: parse error: {}", e);
            shell.last_status = 2;
            return;
        }
    };

    let placement = if pipeline.background {
        Placement::Background
    } else {
        Placement::Foreground
    };

    shell.last_status = launcher::launch(shell, &pipeline, placement);
}
