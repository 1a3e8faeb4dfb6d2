use crate::{error::MonitorError, sync::ResourceMonitor};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    ops::Range,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, info};

/// Idle and hold intervals, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    pub idle: Range<u64>,
    pub hold: Range<u64>,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            idle: 100..500,
            hold: 100..500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorReport {
    pub id: usize,
    pub cycles_completed: usize,
    /// Time spent blocked in `request()`
    pub waited: Duration,
}

/// Idles, takes both resources, holds them, gives them back. `cycles` times over.
pub struct Actor<M: ResourceMonitor> {
    id: usize,
    monitor: Arc<M>,
    cycles: usize,
    timing: Timing,
    rng: StdRng,
}

impl<M: ResourceMonitor> Actor<M> {
    pub fn new(id: usize, monitor: &Arc<M>, cycles: usize, timing: Timing) -> Self {
        Self {
            id,
            monitor: monitor.clone(),
            cycles,
            timing,
            rng: StdRng::from_entropy(),
        }
    }

    // Reproducible intervals, each actor gets its own stream
    pub fn seeded(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed.wrapping_add(self.id as u64));
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Stops at the first error; an `Interrupted` request means the run is being torn down.
    pub fn run(mut self) -> Result<ActorReport, MonitorError> {
        info!(actor = self.id, cycles = self.cycles, "actor started");
        let mut waited = Duration::ZERO;
        for cycle in 0..self.cycles {
            pause(&mut self.rng, &self.timing.idle);

            let start = Instant::now();
            let grant = self.monitor.acquire(self.id)?;
            waited += start.elapsed();
            debug!(actor = self.id, cycle, "holding resources");

            pause(&mut self.rng, &self.timing.hold);
            grant.release()?;
        }
        info!(actor = self.id, cycles = self.cycles, ?waited, "actor finished");
        Ok(ActorReport {
            id: self.id,
            cycles_completed: self.cycles,
            waited,
        })
    }
}

fn pause(rng: &mut StdRng, ms: &Range<u64>) {
    if ms.is_empty() {
        return;
    }
    let t = rng.gen_range(ms.clone());
    if t > 0 {
        thread::sleep(Duration::from_millis(t));
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        actor::{Actor, Timing},
        error::MonitorError,
        sync::{neighbor_monitor::NeighborMonitor, ActorState, ResourceMonitor},
    };
    use std::{
        sync::Arc,
        thread,
        time::{Duration, Instant},
    };

    fn quick() -> Timing {
        Timing {
            idle: 0..3,
            hold: 0..3,
        }
    }

    #[test]
    fn runs_all_cycles() {
        let m = Arc::new(NeighborMonitor::new(3).unwrap());
        let report = Actor::new(1, &m, 4, quick()).run().unwrap();
        assert_eq!(report.id, 1);
        assert_eq!(report.cycles_completed, 4);
        let stats = m.stats();
        assert_eq!(stats.grants, 4);
        assert_eq!(stats.releases, 4);
        assert_eq!(m.snapshot(), vec![ActorState::Idle; 3]);
    }

    #[test]
    fn zero_width_timing_never_sleeps() {
        let m = Arc::new(NeighborMonitor::new(2).unwrap());
        let timing = Timing {
            idle: 0..0,
            hold: 0..0,
        };
        let actor = Actor::new(0, &m, 1_000, timing).seeded(7);
        assert_eq!(actor.id(), 0);
        let start = Instant::now();
        let report = actor.run().unwrap();
        assert_eq!(report.cycles_completed, 1_000);
        // Even a 1ms pause per step would take seconds
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn stops_when_interrupted() {
        let m = Arc::new(NeighborMonitor::new(5).unwrap());
        m.request(0).unwrap();

        // Neighbor of 0, so the first request blocks
        let th = thread::spawn({
            let actor = Actor::new(1, &m, 5, quick());
            move || actor.run()
        });
        thread::sleep(Duration::from_millis(100));
        assert!(!th.is_finished());

        m.shutdown();
        assert_eq!(
            th.join().unwrap(),
            Err(MonitorError::Interrupted { actor: 1 })
        );
        assert_eq!(m.stats().grants, 1);
    }

    #[test]
    fn unknown_id_fails_fast() {
        let m = Arc::new(NeighborMonitor::new(2).unwrap());
        let err = Actor::new(2, &m, 1, quick()).run().unwrap_err();
        assert!(err.is_contract_violation());
    }
}
