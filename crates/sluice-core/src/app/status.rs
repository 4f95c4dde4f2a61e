//! Status - ループ実行中のカウンタ
//!
//! 外部のスーパーバイザやログ向けのスナップショット。

use serde::{Deserialize, Serialize};

use super::transaction::CycleOutcome;
use crate::domain::{ExitCode, Response, RunId};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    pub run_id: Option<RunId>,
    pub cycles: u64,
    pub committed: u64,
    pub rolled_back: u64,
    pub records_in: u64,
    pub records_out: u64,
    pub faults_out: u64,
    pub last_error: Option<String>,
    pub exit_code: Option<ExitCode>,
}

impl NodeStatus {
    /// Reset the counters for a new run.
    pub fn begin_run(&mut self, run_id: RunId) {
        *self = NodeStatus {
            run_id: Some(run_id),
            ..NodeStatus::default()
        };
    }

    pub fn record_cycle(&mut self, records_in: usize, outcome: &CycleOutcome) {
        self.cycles += 1;
        self.records_in += records_in as u64;

        match outcome {
            CycleOutcome::Committed(response) => {
                self.committed += 1;
                self.count_output(response);
            }
            CycleOutcome::Completed(response) => self.count_output(response),
            CycleOutcome::RolledBack(err) => {
                self.rolled_back += 1;
                self.last_error = Some(err.to_string());
            }
            CycleOutcome::Failed(err) => self.last_error = Some(err.to_string()),
        }
    }

    pub fn record_error(&mut self, error: impl ToString) {
        self.last_error = Some(error.to_string());
    }

    pub fn finish(&mut self, exit_code: ExitCode) {
        self.exit_code = Some(exit_code);
    }

    fn count_output(&mut self, response: &Response) {
        for record in response.batches().iter().flatten() {
            self.records_out += 1;
            if record.is_fault() {
                self.faults_out += 1;
            }
        }
    }
}
