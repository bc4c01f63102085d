//! Bounded worker pool over jobs.
//!
//! A fixed number of threads drain a shared job queue; each claims one job
//! at a time and runs it to completion, so no job is ever processed twice.
//! Outcomes go back to the caller over an [`mpsc`] channel as [`JobMsg`]s.
//!
//! ## For contributors
//!
//! Detail pages within one job are fetched sequentially on the worker that
//! claimed it. Concurrency is only across jobs; raise `--workers` rather than
//! parallelising inside an adapter.

use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, FixedOffset};
use tracing::{debug, error, info};

use crate::config::JobRow;
use crate::feed;
use crate::registry::ProviderRegistry;
use crate::scrape::{self, is_job_level};
use crate::source::Fetch;

/// Messages sent from workers back to the caller.
#[derive(Debug)]
pub enum JobMsg {
    /// The feed was written with this many items.
    Finished {
        feed_name: String,
        items: usize,
        path: PathBuf,
    },
    /// The job could not start (unknown provider, unusable options).
    Skipped { feed_name: String, reason: String },
    /// The job started but its feed could not be written.
    Failed { feed_name: String, error: String },
}

/// Everything a worker needs, shared read-only between workers.
pub struct JobContext {
    pub registry: ProviderRegistry,
    pub fetcher: Arc<dyn Fetch>,
    pub out_dir: PathBuf,
    /// Start of the run; every feed carries it as its build time.
    pub now: DateTime<FixedOffset>,
}

/// How long an idle worker waits on the queue before giving up.
const IDLE_TIMEOUT: Duration = Duration::from_millis(200);

/// Run one job and write its feed.
pub fn run_job(ctx: &JobContext, job: &JobRow) -> JobMsg {
    let outcome = match scrape::scrape(&ctx.registry, ctx.fetcher.clone(), &job.provider, &job.options) {
        Ok(outcome) => outcome,
        Err(e) if is_job_level(&e) => {
            return JobMsg::Skipped {
                feed_name: job.feed_name.clone(),
                reason: e.to_string(),
            }
        }
        Err(e) => {
            return JobMsg::Failed {
                feed_name: job.feed_name.clone(),
                error: e.to_string(),
            }
        }
    };

    let channel = feed::build_channel(job, &outcome.defaults, &outcome.items, ctx.now);
    match feed::write_feed(&ctx.out_dir, job, &channel)
        .with_context(|| format!("writing feed {}", job.feed_name))
    {
        Ok(path) => JobMsg::Finished {
            feed_name: job.feed_name.clone(),
            items: outcome.items.len(),
            path,
        },
        Err(e) => JobMsg::Failed {
            feed_name: job.feed_name.clone(),
            error: format!("{e:#}"),
        },
    }
}

/// Spawn `workers` threads over `jobs`.
///
/// Returns a receiver that yields one [`JobMsg`] per job, plus the worker
/// handles. The channel closes once every worker has exited.
pub fn spawn(
    jobs: Vec<JobRow>,
    ctx: Arc<JobContext>,
    workers: usize,
) -> (mpsc::Receiver<JobMsg>, Vec<JoinHandle<()>>) {
    let (job_tx, job_rx) = mpsc::channel::<JobRow>();
    let (msg_tx, msg_rx) = mpsc::channel();

    let total = jobs.len();
    for job in jobs {
        // The receiver is alive in this scope, so the send cannot fail.
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    let queue = Arc::new(Mutex::new(job_rx));
    let workers = workers.clamp(1, total.max(1));
    info!(jobs = total, workers, "starting worker pool");

    let handles = (0..workers)
        .map(|id| {
            let queue = Arc::clone(&queue);
            let ctx = Arc::clone(&ctx);
            let tx = msg_tx.clone();
            thread::spawn(move || worker(id, &queue, &ctx, &tx))
        })
        .collect();

    (msg_rx, handles)
}

fn worker(
    id: usize,
    queue: &Mutex<mpsc::Receiver<JobRow>>,
    ctx: &JobContext,
    tx: &mpsc::Sender<JobMsg>,
) {
    loop {
        let next = match queue.lock() {
            Ok(rx) => rx.recv_timeout(IDLE_TIMEOUT),
            Err(_) => {
                error!(worker = id, "job queue poisoned");
                return;
            }
        };
        let Ok(job) = next else {
            debug!(worker = id, "queue drained");
            return;
        };

        debug!(worker = id, feed = %job.feed_name, provider = %job.provider, "job claimed");
        // If the receiver is gone the caller has stopped listening.
        if tx.send(run_job(ctx, &job)).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::registry_fixtures::{INDEX_HTML, INDEX_URL};
    use crate::source::{FixtureFetcher, DEFAULTS};
    use chrono::TimeZone;

    fn job(provider: &str, feed_name: &str) -> JobRow {
        JobRow {
            provider: provider.into(),
            options: INDEX_URL.into(),
            feed_name: feed_name.into(),
            webmaster: "webmaster@example.org".into(),
            docs: "comune".into(),
            channel_categories: vec![("channel-category-name".into(), "Comune di B".into())],
        }
    }

    fn context(out_dir: PathBuf) -> JobContext {
        JobContext {
            registry: ProviderRegistry::default(),
            fetcher: Arc::new(FixtureFetcher::new().page(INDEX_URL, INDEX_HTML)),
            out_dir,
            now: DEFAULTS
                .timezone
                .with_ymd_and_hms(2024, 3, 8, 6, 0, 0)
                .unwrap()
                .fixed_offset(),
        }
    }

    #[test]
    fn every_job_reports_once() {
        let dir = tempfile::tempdir().unwrap();
        let jobs = vec![
            job("Task", "albo_b.xml"),
            job("Sconosciuto", "albo_c.xml"),
            job("Task", "albo_d"),
        ];

        let (rx, handles) = spawn(jobs, Arc::new(context(dir.path().to_path_buf())), 2);
        let mut msgs: Vec<JobMsg> = rx.iter().collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(msgs.len(), 3);
        msgs.sort_by_key(|msg| match msg {
            JobMsg::Finished { feed_name, .. }
            | JobMsg::Skipped { feed_name, .. }
            | JobMsg::Failed { feed_name, .. } => feed_name.clone(),
        });

        assert!(matches!(&msgs[0], JobMsg::Finished { items: 2, path, .. }
            if path.ends_with("albo_b.xml")));
        assert!(matches!(&msgs[1], JobMsg::Skipped { reason, .. } if reason.contains("Sconosciuto")));
        assert!(matches!(&msgs[2], JobMsg::Finished { path, .. } if path.ends_with("albo_d.xml")));
        assert!(!dir.path().join("albo_c.xml").exists());
    }

    #[test]
    fn unwritable_directory_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path().join("missing"));

        let msg = run_job(&ctx, &job("Task", "albo_b.xml"));
        assert!(matches!(msg, JobMsg::Failed { error, .. } if error.contains("albo_b.xml")));
    }
}
