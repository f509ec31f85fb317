// crates/orchestrator/src/orchestrator.rs
//! Orchestrator - runs a job's scan phase, then its fingerprint phase

use anyhow::{Context, Result};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use synprobe_common::{
    Endpoint, FingerprintResult, Fingerprinter, PortScanner, ScanJob, ScanReport, Transport,
};
use crate::progress::ProgressTracker;

/// Coordinates one scanner and one fingerprinter over a job's ports.
pub struct Orchestrator {
    scanner: Arc<dyn PortScanner>,
    fingerprinter: Arc<dyn Fingerprinter>,
    progress: Arc<ProgressTracker>,
}

impl Orchestrator {
    pub fn new(scanner: Arc<dyn PortScanner>, fingerprinter: Arc<dyn Fingerprinter>) -> Self {
        Self {
            scanner,
            fingerprinter,
            progress: Arc::new(ProgressTracker::new()),
        }
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Run `job` to completion.
    ///
    /// Only ports the scanner reports open are fingerprinted. Results keep
    /// the job's port order whatever the concurrency.
    #[instrument(skip(self, job), fields(job_id = %job.id, host = %job.host))]
    pub async fn run(&self, job: ScanJob) -> Result<ScanReport> {
        job.options.validate().context("Invalid scan options")?;
        let endpoints = job
            .ports
            .iter()
            .map(|&port| job.endpoint(port))
            .collect::<Result<Vec<Endpoint>, _>>()
            .context("Invalid port in job")?;

        let start = Instant::now();
        let concurrency = job.options.concurrency;
        self.progress.set_total(endpoints.len());
        info!(
            "Scanning {} port(s) with {} (concurrency {})",
            endpoints.len(),
            self.scanner.name(),
            concurrency
        );

        let open_ports = self.scan_phase(&endpoints, concurrency).await?;
        info!("Open ports: {:?}", open_ports);

        let open: Vec<Endpoint> = endpoints
            .into_iter()
            .filter(|ep| open_ports.contains(&ep.port()))
            .collect();
        let results = self.fingerprint_phase(open, concurrency).await?;

        self.progress.print_summary();
        Ok(ScanReport {
            job_id: job.id,
            host: job.host,
            ip: Some(job.ip),
            scanned_ports: job.ports,
            open_ports,
            results,
            elapsed: start.elapsed(),
        })
    }

    async fn scan_phase(&self, endpoints: &[Endpoint], concurrency: usize) -> Result<Vec<u16>> {
        if concurrency <= 1 {
            let open = self.scanner.open_ports(endpoints).await;
            for ep in endpoints {
                self.progress.record_scanned(open.contains(&ep.port()));
            }
            return Ok(open);
        }

        let scanner = self.scanner.clone();
        let progress = self.progress.clone();
        let checked = run_workers(endpoints.to_vec(), concurrency, move |ep: Endpoint| {
            let scanner = scanner.clone();
            let progress = progress.clone();
            async move {
                let open = scanner.is_open(&ep).await;
                progress.record_scanned(open);
                (ep.port(), open)
            }
        })
        .await?;

        Ok(checked
            .into_iter()
            .filter_map(|(port, open)| open.then_some(port))
            .collect())
    }

    async fn fingerprint_phase(
        &self,
        open: Vec<Endpoint>,
        concurrency: usize,
    ) -> Result<Vec<FingerprintResult>> {
        let fingerprinter = self.fingerprinter.clone();
        let progress = self.progress.clone();
        run_workers(open, concurrency, move |ep: Endpoint| {
            let fingerprinter = fingerprinter.clone();
            let progress = progress.clone();
            async move {
                debug!("Fingerprinting port {}", ep.port());
                let result = fingerprinter.fingerprint(&ep).await;
                progress.record_fingerprinted(result.transport() != Transport::Unknown);
                debug!(port = ep.port(), label = %result.label(), "fingerprinted");
                result
            }
        })
        .await
    }
}

/// Fixed worker pool over a shared queue; output is in input order.
async fn run_workers<T, R, F, Fut>(items: Vec<T>, concurrency: usize, work: F) -> Result<Vec<R>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    let total = items.len();
    let queue = Arc::new(Mutex::new(items.into_iter().enumerate().collect::<VecDeque<_>>()));
    let results = Arc::new(Mutex::new(Vec::with_capacity(total)));
    let work = Arc::new(work);

    let mut workers = Vec::new();
    for _ in 0..concurrency.clamp(1, total.max(1)) {
        let queue = queue.clone();
        let results = results.clone();
        let work = work.clone();

        workers.push(tokio::spawn(async move {
            loop {
                let next = queue.lock().await.pop_front();
                let Some((index, item)) = next else {
                    break; // queue empty, exit worker
                };
                let output = work(item).await;
                results.lock().await.push((index, output));
            }
        }));
    }

    for w in workers {
        w.await.context("Worker task failed")?;
    }

    let mut done = std::mem::take(&mut *results.lock().await);
    done.sort_by_key(|(index, _)| *index);
    Ok(done.into_iter().map(|(_, output)| output).collect())
}
