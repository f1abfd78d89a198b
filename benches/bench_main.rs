//! jobsh ベンチマーク: パーサー、ビルトインディスパッチ、ジョブテーブル操作の計測。
//!
//! `std::time::Instant` による手動計測（外部クレート不要）。
//! フォアグラウンドモニタ・ランチャーは実端末と実プロセスを要求するため対象外。
//!
//! 実行: `cargo bench`

use std::time::{Duration, Instant};

// ── ベンチマークインフラ ──────────────────────────────────────────

struct BenchResult {
    category: &'static str,
    name: &'static str,
    avg: Duration,
    iters: u64,
}

impl BenchResult {
    fn print(&self) {
        let avg_us = self.avg.as_nanos() as f64 / 1000.0;
        println!(
            "[{:<8}] {:<40}: avg {:>10.2}µs  ({} iters)",
            self.category, self.name, avg_us, self.iters,
        );
    }
}

fn bench<F: FnMut()>(category: &'static str, name: &'static str, iters: u64, mut f: F) -> BenchResult {
    // ウォームアップ
    for _ in 0..iters.min(100) {
        f();
    }

    let start = Instant::now();
    for _ in 0..iters {
        f();
    }
    let elapsed = start.elapsed();

    BenchResult {
        category,
        name,
        avg: elapsed / iters as u32,
        iters,
    }
}

// ── メイン ────────────────────────────────────────────────────────

fn main() {
    println!("jobsh benchmark suite");
    println!("{}", "=".repeat(80));

    let mut results = Vec::new();

    // ── パーサーベンチマーク ──
    println!("\n--- Parser ---");

    results.push(bench("parser", "echo hello", 10_000, || {
        let _ = jobsh::parser::parse("echo hello");
    }));

    results.push(bench("parser", "echo \"hello world\"", 10_000, || {
        let _ = jobsh::parser::parse("echo \"hello world\"");
    }));

    results.push(bench("parser", "ls | grep Cargo | wc -l", 10_000, || {
        let _ = jobsh::parser::parse("ls | grep Cargo | wc -l");
    }));

    results.push(bench("parser", "cat < in.txt > out.txt", 10_000, || {
        let _ = jobsh::parser::parse("cat < in.txt > out.txt");
    }));

    results.push(bench("parser", "sleep 1 &", 10_000, || {
        let _ = jobsh::parser::parse("sleep 1 &");
    }));

    results.push(bench("parser", "echo a\\ b\\ c", 10_000, || {
        let _ = jobsh::parser::parse(r"echo a\ b\ c");
    }));

    for r in &results {
        r.print();
    }
    results.clear();

    // ── ビルトイン判定ベンチマーク ──
    println!("\n--- Builtins dispatch ---");

    results.push(bench("builtin", "is_builtin(\"cd\") (hit)", 100_000, || {
        let _ = jobsh::builtins::is_builtin("cd");
    }));

    results.push(bench("builtin", "is_builtin(\"grep\") (miss)", 100_000, || {
        let _ = jobsh::builtins::is_builtin("grep");
    }));

    // ビルトイン実行はシェル状態を要求するので、端末に接続している前提で確保する。
    // （このベンチ自体、端末のない CI 環境では `cargo bench` を素朴に実行できない。）
    let mut shell = jobsh::shell::Shell::new().expect("bench_main requires a controlling terminal");

    results.push(bench("builtin", "echo hello (in-process)", 10_000, || {
        let mut buf = Vec::new();
        let _ = jobsh::builtins::try_exec(&mut shell, &["echo", "hello"], &mut buf);
    }));

    results.push(bench("builtin", "pwd (in-process)", 10_000, || {
        let mut buf = Vec::new();
        let _ = jobsh::builtins::try_exec(&mut shell, &["pwd"], &mut buf);
    }));

    for r in &results {
        r.print();
    }
    results.clear();

    // ── ジョブテーブルベンチマーク ──
    println!("\n--- Job table ---");

    results.push(bench("jobtable", "allocate_background + add_job + add_process", 10_000, || {
        let mut jobs = jobsh::job::JobTable::new();
        let tmodes: libc::termios = unsafe { std::mem::zeroed() };
        let slot = jobs.allocate_background();
        jobs.add_job(slot, 4242, tmodes);
        jobs.add_process(slot, 4242, &["sleep", "1"]);
    }));

    results.push(bench("jobtable", "job_state lookup (running)", 10_000, || {
        let mut jobs = jobsh::job::JobTable::new();
        let tmodes: libc::termios = unsafe { std::mem::zeroed() };
        let slot = jobs.allocate_background();
        jobs.add_job(slot, 4242, tmodes);
        jobs.add_process(slot, 4242, &["sleep", "1"]);
        let _ = jobs.job_state(slot);
    }));

    for r in &results {
        r.print();
    }

    println!("\n{}", "=".repeat(80));
    println!("done.");
}
