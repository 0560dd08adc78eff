//! Consumer side of the report channel

use super::dispatcher::JobOutcome;
use super::interface::{MiningResult, Report, ReportSender};
use crate::prelude::*;
use crossbeam::channel::{bounded, select, Receiver};
use indicatif::ProgressBar;
use std::cmp::min;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Create a report channel holding at most `capacity` undelivered reports.
pub fn channel(capacity: usize) -> (ReportSender, ResultSink) {
    let (tx, rx) = bounded(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));

    (
        ReportSender::new(tx, dropped.clone()),
        ResultSink { rx, dropped },
    )
}

/// Receives worker reports in the order they were emitted.
pub struct ResultSink {
    rx: Receiver<Report>,
    dropped: Arc<AtomicU64>,
}

impl ResultSink {
    /// Number of reports discarded because the channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Every report in emission order, blocking for the next one. Ends once
    /// all senders are gone.
    pub fn consume(&self) -> impl Iterator<Item = Report> + '_ {
        self.rx.iter()
    }

    /// Drive the status line until every sender is gone, printing worker
    /// outcomes above it as they arrive.
    pub fn run(self, outcomes: Receiver<JobOutcome>, pb: ProgressBar) {
        let mut telemetry = Telemetry::default();

        loop {
            select! {
                recv(self.rx) -> report => match report {
                    Ok(report) => self.show(&mut telemetry, report, &pb),
                    Err(_) => {
                        // the dispatcher sends its last outcome after its workers stop
                        for outcome in outcomes.iter() {
                            pb.println(outcome.to_string());
                        }
                        break;
                    }
                },
                recv(outcomes) -> outcome => match outcome {
                    Ok(outcome) => pb.println(outcome.to_string()),
                    Err(_) => {
                        for report in self.consume() {
                            self.show(&mut telemetry, report, &pb);
                        }
                        break;
                    }
                },
            }
        }

        pb.finish();
    }

    fn show(&self, telemetry: &mut Telemetry, report: Report, pb: &ProgressBar) {
        if let Report::Candidate {
            result: MiningResult { nonce, digest },
            ..
        } = report
        {
            trace!("Nonce: {}, Hash: {}", nonce, hex::encode(digest));
        }

        telemetry.record(report);
        pb.set_message(&telemetry.line(self.dropped()));
    }
}

/// The latest state of the search, as shown to the user
#[derive(Debug, Default)]
pub struct Telemetry {
    job_id: Option<Arc<str>>,
    last: Option<MiningResult>,
    per_second: f64,
}

impl Telemetry {
    /// Fold in a report. A report for a different job than the current one
    /// switches jobs even if that job's `Started` marker was dropped.
    pub fn record(&mut self, report: Report) {
        let switched = self.job_id.as_ref() != Some(report.job_id());

        if switched || matches!(report, Report::Started { .. }) {
            self.job_id = Some(report.job_id().clone());
            self.last = None;
            self.per_second = 0.;
        }

        match report {
            Report::Started { .. } => {}
            Report::Candidate { result, .. } => self.last = Some(result),
            Report::HashRate { per_second, .. } => self.per_second = per_second,
        }
    }

    pub fn line(&self, dropped: u64) -> String {
        let job = self.job_id.as_deref().unwrap_or("-");

        match self.last {
            Some(MiningResult { nonce, digest }) => format!(
                "job {} | nonce {} | {} | {} | {} dropped",
                job,
                nonce,
                hex::encode(digest),
                format_rate(self.per_second),
                dropped
            ),
            None => format!("job {} | waiting for results", job),
        }
    }
}

/// Format a hash rate with an SI prefix, e.g. `1.5 Mh/s`
pub fn format_rate(per_second: f64) -> String {
    const PREFIXES: [&str; 5] = ["", "k", "M", "G", "T"];
    let magnitude = min(PREFIXES.len() - 1, per_second.log(1000.).floor() as usize);
    let value = per_second / 1000f64.powf(magnitude as f64);

    format!("{:.1} {}h/s", value, PREFIXES[magnitude])
}
