use crate::{
    actor::{Actor, ActorReport, Timing},
    error::MonitorError,
    sync::{neighbor_monitor::NeighborMonitor, ResourceMonitor, Transition},
};
use anyhow::{anyhow, bail, ensure, Context, Result};
use std::{
    sync::{
        mpsc::{self, RecvTimeoutError},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub actors: usize,
    pub cycles: usize,
    pub timing: Timing,
    /// Shut the monitor down if the run is still going after this long
    pub deadline: Option<Duration>,
    pub seed: Option<u64>,
    pub record_history: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            actors: 5,
            cycles: 5,
            timing: Timing::default(),
            deadline: None,
            seed: None,
            record_history: false,
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(self.actors > 0, "need at least one actor");
        // 0..0 is allowed and means no pause at all
        ensure!(
            self.timing.idle.start <= self.timing.idle.end,
            "idle range {:?} is reversed",
            self.timing.idle
        );
        ensure!(
            self.timing.hold.start <= self.timing.hold.end,
            "hold range {:?} is reversed",
            self.timing.hold
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub actors: usize,
    pub cycles: usize,
    pub grants: u64,
    pub releases: u64,
    pub waits: u64,
    pub elapsed: Duration,
    pub per_actor: Vec<ActorReport>,
    pub history: Vec<Transition>,
}

/// Spawns one thread per actor around a shared monitor and waits for all of them.
pub struct Harness {
    config: HarnessConfig,
    monitor: Arc<NeighborMonitor>,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Result<Self> {
        config.validate()?;
        let monitor = Arc::new(fresh_monitor(&config)?);
        Ok(Self { config, monitor })
    }

    /// The monitor of the latest run, or an untouched one before the first run
    pub fn monitor(&self) -> &Arc<NeighborMonitor> {
        &self.monitor
    }

    /// Every run gets a new monitor, so totals and shutdown never carry over between runs.
    pub fn run(&mut self) -> Result<RunReport> {
        let HarnessConfig {
            actors,
            cycles,
            deadline,
            seed,
            ..
        } = self.config;
        self.monitor = Arc::new(fresh_monitor(&self.config)?);
        info!(actors, cycles, "starting actors");
        let start = Instant::now();

        // Every thread holds a sender, the channel disconnects once all of them are gone
        let (tx, rx) = mpsc::channel::<usize>();
        let mut ths = Vec::with_capacity(actors);
        for id in 0..actors {
            let mut actor = Actor::new(id, &self.monitor, cycles, self.config.timing.clone());
            if let Some(seed) = seed {
                actor = actor.seeded(seed);
            }
            let tx = tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("actor-{}", actor.id()))
                .spawn(move || {
                    let result = actor.run();
                    // Harness may have stopped listening after its deadline
                    let _ = tx.send(id);
                    result
                });
            match spawned {
                Ok(th) => ths.push(th),
                Err(e) => {
                    self.monitor.shutdown();
                    let _ = join_all(ths);
                    return Err(e).with_context(|| format!("spawning actor {id}"));
                }
            }
        }
        drop(tx);

        let timed_out = deadline.is_some_and(|deadline| self.wait_until(&rx, start + deadline));
        let per_actor = join_all(ths);
        let elapsed = start.elapsed();

        if timed_out {
            bail!(
                "actors still running after {:?}, monitor was shut down",
                deadline.unwrap_or_default()
            );
        }
        let per_actor = per_actor
            .into_iter()
            .enumerate()
            .map(|(id, result)| result.with_context(|| format!("actor {id}")))
            .collect::<Result<Vec<_>>>()?;

        let stats = self.monitor.stats();
        info!(grants = stats.grants, releases = stats.releases, ?elapsed, "all actors finished");
        Ok(RunReport {
            actors,
            cycles,
            grants: stats.grants,
            releases: stats.releases,
            waits: stats.waits,
            elapsed,
            per_actor,
            history: self.monitor.history(),
        })
    }

    // True if the deadline passed and the monitor had to be shut down
    fn wait_until(&self, rx: &mpsc::Receiver<usize>, deadline: Instant) -> bool {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok(_) => continue,
                Err(RecvTimeoutError::Disconnected) => return false,
                Err(RecvTimeoutError::Timeout) => {
                    warn!("deadline passed, shutting down monitor");
                    self.monitor.shutdown();
                    return true;
                }
            }
        }
    }
}

fn fresh_monitor(config: &HarnessConfig) -> Result<NeighborMonitor, MonitorError> {
    if config.record_history {
        NeighborMonitor::with_history(config.actors)
    } else {
        NeighborMonitor::new(config.actors)
    }
}

fn join_all<T>(ths: Vec<JoinHandle<Result<T, MonitorError>>>) -> Vec<Result<T>> {
    ths.into_iter()
        .map(|th| {
            th.join()
                .map_err(|_| anyhow!("actor thread panicked"))?
                .map_err(anyhow::Error::from)
        })
        .collect()
}
