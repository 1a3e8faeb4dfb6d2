use super::{left, right, ActorState, MonitorStats, ResourceMonitor, Transition};
use crate::error::MonitorError;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

/// Monitor over a ring of `n` actors: one lock guarding every actor's state, and one condition
/// per actor that is signalled exactly when that actor is made `Active`.
pub struct NeighborMonitor {
    n: usize,
    table: Mutex<Table>,
    ready: Vec<Condvar>,
}

struct Table {
    states: Vec<ActorState>,
    shut_down: bool,
    stats: MonitorStats,
    seq: u64,
    history: Option<Vec<Transition>>,
}

impl Table {
    fn set(&mut self, actor: usize, to: ActorState) {
        let from = self.states[actor];
        self.states[actor] = to;
        debug!(actor, ?from, ?to, "transition");
        if let Some(history) = self.history.as_mut() {
            history.push(Transition {
                seq: self.seq,
                actor,
                from,
                to,
                states: self.states.clone(),
            });
        }
        self.seq += 1;
    }
}

impl NeighborMonitor {
    pub fn new(n: usize) -> Result<Self, MonitorError> {
        Self::build(n, false)
    }

    /// Same as `new()`, but every transition is recorded for `history()`
    pub fn with_history(n: usize) -> Result<Self, MonitorError> {
        Self::build(n, true)
    }

    fn build(n: usize, record: bool) -> Result<Self, MonitorError> {
        if n == 0 {
            return Err(MonitorError::NoActors);
        }
        Ok(Self {
            n,
            table: Mutex::new(Table {
                states: vec![ActorState::Idle; n],
                shut_down: false,
                stats: MonitorStats::default(),
                seq: 0,
                history: record.then(Vec::new),
            }),
            ready: (0..n).map(|_| Condvar::new()).collect(),
        })
    }

    pub fn snapshot(&self) -> Vec<ActorState> {
        self.table.lock().states.clone()
    }

    pub fn stats(&self) -> MonitorStats {
        self.table.lock().stats
    }

    /// Empty unless built `with_history()`
    pub fn history(&self) -> Vec<Transition> {
        self.table.lock().history.clone().unwrap_or_default()
    }

    fn check(&self, actor: usize) -> Result<(), MonitorError> {
        if actor < self.n {
            return Ok(());
        }
        let e = MonitorError::UnknownActor {
            actor,
            actors: self.n,
        };
        error!(error = %e, "contract violation");
        Err(e)
    }

    // Grants `actor` if it wants the resources and neither neighbor holds them
    fn test(&self, table: &mut Table, actor: usize) {
        if table.shut_down {
            return;
        }
        if table.states[actor] == ActorState::Waiting
            && table.states[left(actor, self.n)] != ActorState::Active
            && table.states[right(actor, self.n)] != ActorState::Active
        {
            table.set(actor, ActorState::Active);
            table.stats.grants += 1;
            self.ready[actor].notify_one();
        }
    }
}

impl ResourceMonitor for NeighborMonitor {
    fn actors(&self) -> usize {
        self.n
    }

    fn request(&self, actor: usize) -> Result<(), MonitorError> {
        self.check(actor)?;
        let mut table = self.table.lock();
        if table.shut_down {
            return Err(MonitorError::Interrupted { actor });
        }
        let state = table.states[actor];
        if state != ActorState::Idle {
            let e = MonitorError::NotIdle { actor, state };
            error!(error = %e, "contract violation");
            return Err(e);
        }

        table.set(actor, ActorState::Waiting);
        self.test(&mut table, actor);
        if table.states[actor] != ActorState::Active {
            table.stats.waits += 1;
        }
        // Loop guards against spurious wakeups, wait() releases the lock while blocked
        while table.states[actor] != ActorState::Active {
            if table.shut_down {
                table.set(actor, ActorState::Idle);
                return Err(MonitorError::Interrupted { actor });
            }
            self.ready[actor].wait(&mut table);
        }
        Ok(())
    }

    fn release(&self, actor: usize) -> Result<(), MonitorError> {
        self.check(actor)?;
        let mut table = self.table.lock();
        let state = table.states[actor];
        if state != ActorState::Active {
            let e = MonitorError::NotActive { actor, state };
            error!(error = %e, "contract violation");
            return Err(e);
        }

        table.set(actor, ActorState::Idle);
        table.stats.releases += 1;
        self.test(&mut table, left(actor, self.n));
        self.test(&mut table, right(actor, self.n));
        Ok(())
    }

    fn shutdown(&self) {
        // Flag is read under the lock before every wait, so no waiter can miss it
        self.table.lock().shut_down = true;
        for ready in &self.ready {
            ready.notify_all();
        }
    }

    fn is_shut_down(&self) -> bool {
        self.table.lock().shut_down
    }
}
