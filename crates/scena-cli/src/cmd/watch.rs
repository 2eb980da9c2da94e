//! `scena watch`: poll the board at a fixed interval.

use crate::backend::Session;
use crate::cmd::board::{BoardView, write_pretty, write_text};
use crate::output::{OutputMode, pretty_rule, render_mode};
use clap::Args;
use scena_core::replica::ReconcileReport;
use std::io::{self, Write};
use std::thread;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Poll interval; defaults to `poll_interval_ms` from config.
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Stop after this many polls (runs until interrupted otherwise).
    #[arg(long)]
    pub iterations: Option<u64>,
}

fn write_report(report: &ReconcileReport, w: &mut dyn Write) -> io::Result<()> {
    for conflict in &report.conflicts {
        writeln!(
            w,
            "conflict\t{}\tlocal {}\tserver {}",
            conflict.task, conflict.local, conflict.server
        )?;
    }
    for id in &report.vanished {
        writeln!(w, "vanished\t{id}")?;
    }
    Ok(())
}

pub fn run_watch(args: &WatchArgs, session: &Session, output: OutputMode) -> anyhow::Result<()> {
    let interval = Duration::from_millis(args.interval_ms.unwrap_or(session.config.poll_interval_ms));
    let mut sync = session.connect()?;
    let mut polls = 1_u64;

    loop {
        let view = BoardView::build(sync.project().as_str(), sync.replica(), None);
        render_mode(output, &view, write_text, |v, w| {
            write_pretty(v, w)?;
            pretty_rule(w)
        })?;

        if args.iterations.is_some_and(|max| polls >= max) {
            return Ok(());
        }
        thread::sleep(interval);

        match sync.refresh() {
            Ok(report) => {
                if report.has_conflicts() || !report.vanished.is_empty() {
                    write_report(&report, &mut io::stderr().lock())?;
                }
            }
            Err(err) => {
                tracing::warn!(code = %err.code(), error = %err, "poll failed; keeping last board");
            }
        }
        polls += 1;
    }
}
