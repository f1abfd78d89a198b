//! ジョブテーブル: プロセスグループ・プロセス・端末モードのライフサイクルを管理する。
//!
//! スロット 0 は常にフォアグラウンド用に予約される。バックグラウンドスロットは
//! 1 から始まり、空きスロットがなければテーブルを 1 要素伸ばす
//! （一度伸びたテーブルは縮まない — ハイウォーターマーク方式）。
//! 空きスロットはプロセスグループ ID 0・プロセスなし・空コマンド文字列で表す。

use libc::pid_t;

/// フォアグラウンド専用スロットの固定インデックス。
pub const FOREGROUND: usize = 0;

/// ジョブ内の個別プロセスの状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Running,
    Stopped,
    Finished,
}

/// ジョブの集約状態。個別プロセスの状態から導出される（優先度: Running > Stopped > Finished）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Stopped,
    Finished,
}

/// パイプライン中の1コマンドに対応するプロセス。
pub struct Process {
    pub pid: pid_t,
    pub state: ProcState,
    /// `waitpid` が返した生の wait ステータス。`state == Finished` のときのみ意味を持つ。
    pub status: i32,
}

/// ジョブ。1つのプロセスグループ（1パイプライン）に対応する。
pub struct Job {
    /// 空きスロットでは 0。
    pub pgid: pid_t,
    pub processes: Vec<Process>,
    /// フォアグラウンド化の際に適用・停止時に保存する端末モード。
    pub tmodes: libc::termios,
    /// `[N]` 表示用のコマンド文字列（パイプラインは ` | ` で連結）。
    pub command: String,
}

impl Job {
    fn free() -> Self {
        Self {
            pgid: 0,
            processes: Vec::new(),
            tmodes: unsafe { std::mem::zeroed() },
            command: String::new(),
        }
    }

    /// 集約状態。実行中のプロセスが1つでもあれば Running、
    /// なければ停止中のプロセスが1つでもあれば Stopped、それ以外は Finished。
    pub fn state(&self) -> JobState {
        if self.processes.iter().any(|p| p.state == ProcState::Running) {
            JobState::Running
        } else if self.processes.iter().any(|p| p.state == ProcState::Stopped) {
            JobState::Stopped
        } else {
            JobState::Finished
        }
    }

    fn last_raw_status(&self) -> i32 {
        self.processes.last().map(|p| p.status).unwrap_or(0)
    }
}

/// 生の wait ステータスを終了コードへ変換する。
/// 正常終了は `WEXITSTATUS`、シグナル終了は `128 + シグナル番号`。
pub fn decode_exit_code(raw_status: i32) -> i32 {
    if libc::WIFEXITED(raw_status) {
        libc::WEXITSTATUS(raw_status)
    } else if libc::WIFSIGNALED(raw_status) {
        128 + libc::WTERMSIG(raw_status)
    } else {
        1
    }
}

pub struct JobTable {
    slots: Vec<Job>,
}

impl JobTable {
    pub fn new() -> Self {
        Self { slots: vec![Job::free()] }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn allocate_foreground(&mut self) -> usize {
        FOREGROUND
    }

    /// 最小未使用スロット（index >= 1）を探す。なければテーブルを1要素伸ばす。
    pub fn allocate_background(&mut self) -> usize {
        for (i, job) in self.slots.iter().enumerate().skip(1) {
            if job.pgid == 0 {
                return i;
            }
        }
        self.slots.push(Job::free());
        self.slots.len() - 1
    }

    pub fn add_job(&mut self, slot: usize, pgid: pid_t, tmodes: libc::termios) {
        self.slots[slot] = Job {
            pgid,
            processes: Vec::new(),
            tmodes,
            command: String::new(),
        };
    }

    pub fn add_process(&mut self, slot: usize, pid: pid_t, argv: &[&str]) {
        let job = &mut self.slots[slot];
        if !job.command.is_empty() {
            job.command.push_str(" | ");
        }
        job.command.push_str(&argv.join(" "));
        job.processes.push(Process {
            pid,
            state: ProcState::Running,
            status: 0,
        });
    }

    /// 占有されたスロットを `&Job` で返す。空きスロットには `None`。
    pub fn get(&self, slot: usize) -> Option<&Job> {
        self.slots.get(slot).filter(|j| j.pgid != 0)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Job> {
        self.slots.get_mut(slot).filter(|j| j.pgid != 0)
    }

    /// スロットの状態を問い合わせる。`Finished` の場合は結果を返した上でスロットを解放する。
    pub fn job_state(&mut self, slot: usize) -> Option<(JobState, Option<i32>)> {
        let job = self.get(slot)?;
        let state = job.state();
        if state == JobState::Finished {
            let raw = job.last_raw_status();
            self.delete(slot);
            Some((state, Some(raw)))
        } else {
            Some((state, None))
        }
    }

    /// `from` の内容を空きスロット `to` へ移す。`from` は空きスロットになる。
    pub fn mv(&mut self, from: usize, to: usize) {
        assert_eq!(self.slots[to].pgid, 0, "move destination must be a free slot");
        self.slots[to] = std::mem::replace(&mut self.slots[from], Job::free());
    }

    /// スロットを解放する。
    pub fn delete(&mut self, slot: usize) {
        self.slots[slot] = Job::free();
    }

    /// reaper (SIGCHLD ハンドラ) から呼ばれる。該当 PID のプロセス状態を更新する。
    /// 該当 PID が見つからなければ何もしない（既に reap 済みの可能性がある）。
    pub fn mark_pid(&mut self, pid: pid_t, raw_status: i32) {
        for job in &mut self.slots {
            for proc in &mut job.processes {
                if proc.pid == pid {
                    proc.status = raw_status;
                    if libc::WIFSTOPPED(raw_status) {
                        proc.state = ProcState::Stopped;
                    } else if libc::WIFCONTINUED(raw_status) {
                        proc.state = ProcState::Running;
                    } else if libc::WIFEXITED(raw_status) || libc::WIFSIGNALED(raw_status) {
                        proc.state = ProcState::Finished;
                    }
                    return;
                }
            }
        }
    }

    /// 最も大きいインデックスを持つ、未完了のバックグラウンドジョブのスロット。
    /// `fg`/`bg` が引数なしで呼ばれた際の対象決定に使う。
    pub fn current_job_id(&self) -> Option<usize> {
        (1..self.slots.len())
            .rev()
            .find(|&i| self.slots[i].pgid != 0 && self.slots[i].state() != JobState::Finished)
    }

    /// 占有されたバックグラウンドスロットのインデックス（0 は含まない）。
    pub fn occupied(&self) -> impl Iterator<Item = usize> + '_ {
        (1..self.slots.len()).filter(move |&i| self.slots[i].pgid != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_tmodes() -> libc::termios {
        unsafe { std::mem::zeroed() }
    }

    #[test]
    fn free_slots_report_as_absent() {
        let table = JobTable::new();
        assert!(table.get(FOREGROUND).is_none());
    }

    #[test]
    fn allocate_background_reuses_lowest_free_slot() {
        let mut table = JobTable::new();
        let s1 = table.allocate_background();
        table.add_job(s1, 100, fake_tmodes());
        let s2 = table.allocate_background();
        table.add_job(s2, 200, fake_tmodes());
        assert_eq!(s1, 1);
        assert_eq!(s2, 2);

        table.delete(s1);
        let s3 = table.allocate_background();
        assert_eq!(s3, 1, "freed slot 1 should be reused before growing the table");
    }

    #[test]
    fn job_state_reaps_finished_jobs() {
        let mut table = JobTable::new();
        let slot = table.allocate_background();
        table.add_job(slot, 42, fake_tmodes());
        table.add_process(slot, 42, &["false"]);
        table.mark_pid(42, libc::W_EXITCODE(1, 0));

        let (state, status) = table.job_state(slot).unwrap();
        assert_eq!(state, JobState::Finished);
        assert_eq!(decode_exit_code(status.unwrap()), 1);
        assert!(table.get(slot).is_none(), "finished job must be reaped from the table");
    }

    #[test]
    fn job_state_does_not_reap_running_or_stopped() {
        let mut table = JobTable::new();
        let slot = table.allocate_background();
        table.add_job(slot, 42, fake_tmodes());
        table.add_process(slot, 42, &["sleep"]);

        let (state, status) = table.job_state(slot).unwrap();
        assert_eq!(state, JobState::Running);
        assert!(status.is_none());
        assert!(table.get(slot).is_some());
    }

    #[test]
    fn move_then_move_back_is_observationally_identical() {
        let mut table = JobTable::new();
        table.add_job(FOREGROUND, 7, fake_tmodes());
        table.add_process(FOREGROUND, 7, &["vi"]);
        table.mark_pid(7, libc::W_STOPCODE(libc::SIGTSTP));

        let bg = table.allocate_background();
        table.mv(FOREGROUND, bg);
        assert!(table.get(FOREGROUND).is_none());
        assert_eq!(table.get(bg).unwrap().pgid, 7);

        table.mv(bg, FOREGROUND);
        assert_eq!(table.get(FOREGROUND).unwrap().pgid, 7);
        assert_eq!(table.get(FOREGROUND).unwrap().command, "vi");
    }

    #[test]
    fn mark_pid_ignores_unknown_pid() {
        let mut table = JobTable::new();
        let slot = table.allocate_background();
        table.add_job(slot, 42, fake_tmodes());
        table.add_process(slot, 42, &["x"]);
        table.mark_pid(9999, libc::W_EXITCODE(0, 0));
        assert_eq!(table.get(slot).unwrap().state(), JobState::Running);
    }

    #[test]
    fn decode_exit_code_for_signaled_process() {
        let raw = libc::W_EXITCODE(0, libc::SIGKILL);
        assert_eq!(decode_exit_code(raw), 128 + libc::SIGKILL);
    }

    #[test]
    fn current_job_id_skips_finished_and_foreground() {
        let mut table = JobTable::new();
        let s1 = table.allocate_background();
        table.add_job(s1, 10, fake_tmodes());
        table.add_process(s1, 10, &["a"]);
        let s2 = table.allocate_background();
        table.add_job(s2, 20, fake_tmodes());
        table.add_process(s2, 20, &["b"]);
        assert_eq!(table.current_job_id(), Some(s2));
    }
}
