//! jobsh ライブラリ — ベンチマーク・テスト用にモジュールを公開する。
//!
//! バイナリ本体は `main.rs` の REPL ループ。
//! この `lib.rs` は `benches/bench_main.rs` 等の外部クレートから
//! パーサー・ビルトイン・ジョブ制御機能に直接アクセスするために存在する。
//!
//! ## モジュール構成
//!
//! | モジュール | 役割 |
//! |-----------|------|
//! | [`parser`] | 構文解析（パイプライン、リダイレクト、クォート、エスケープ、`&`） |
//! | [`redirect`] | `<`/`>`/`>>` の実ファイルディスクリプタへの解決 |
//! | [`executor`] | 1行分の評価（パース → 起動 → `last_status` 更新） |
//! | [`launcher`] | パイプラインの起動（fork、パイプ接続、ジョブ登録） |
//! | [`builtins`] | ビルトイン（`exit`, `cd`, `pwd`, `echo`, `export`, `unset`, `jobs`, `fg`, `bg`, `kill`） |
//! | [`ops`] | ジョブ制御オペレーション（`fg`/`bg`・`kill`・`jobs`・シャットダウン） |
//! | [`job`] | ジョブテーブル（プロセスグループ・プロセス・端末モードの管理） |
//! | [`reaper`] | `SIGCHLD` ハンドラ（非ブロッキング `waitpid` による状態反映） |
//! | [`siggate`] | シグナルゲート（`SIGCHLD` のブロック/解除と `sigsuspend`） |
//! | [`terminal`] | ターミナルアービタ（フォアグラウンドプロセスグループと端末モードの受け渡し） |
//! | [`shell`] | シェルのグローバル状態（終了ステータス、ジョブテーブル、プロセスグループ） |
//! | [`error`] | シェルプロセス自体に致命的なエラー |

pub mod builtins;
pub mod error;
pub mod executor;
pub mod job;
pub mod launcher;
pub mod monitor;
pub mod ops;
pub mod parser;
pub mod reaper;
pub mod redirect;
pub mod shell;
pub mod siggate;
pub mod terminal;
