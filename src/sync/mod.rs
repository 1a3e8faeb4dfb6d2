pub mod neighbor_monitor;

use crate::error::MonitorError;
use tracing::error;

/// Where an actor stands with respect to the two resources it shares with its neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActorState {
    #[default]
    Idle,
    Waiting,
    Active,
}

impl ActorState {
    /// Idle -> Waiting -> Active -> Idle, plus Waiting -> Idle for a wait cut short by shutdown.
    pub fn can_transition_to(self, next: ActorState) -> bool {
        matches!(
            (self, next),
            (ActorState::Idle, ActorState::Waiting)
                | (ActorState::Waiting, ActorState::Active)
                | (ActorState::Active, ActorState::Idle)
                | (ActorState::Waiting, ActorState::Idle)
        )
    }
}

/// Resource monitor for actors sat in a ring, each sharing one resource with either neighbor.
///
/// Requirements
/// 1. Adjacency - no two neighbors are `Active` at once.
/// 2. No Deadlock - a `Waiting` actor is only blocked by an `Active` neighbor, and every `Active`
/// actor eventually calls `release()`.
/// 3. No busy waiting - blocked actors sleep until a release makes them eligible.
///
/// Starvation freedom is only probabilistic: two neighbors that keep taking turns can hold off the
/// actor between them indefinitely. Nothing here queues waiters in arrival order.
pub trait ResourceMonitor {
    fn actors(&self) -> usize;
    /// Blocks until `actor` holds both resources.
    fn request(&self, actor: usize) -> Result<(), MonitorError>;
    /// Never blocks. Fails unless `actor` is `Active`.
    fn release(&self, actor: usize) -> Result<(), MonitorError>;
    /// Wakes every waiter with `Interrupted` and refuses further grants.
    fn shutdown(&self);
    fn is_shut_down(&self) -> bool;

    // Scoped variant of `request()`, resources go back when the guard does
    fn acquire(&self, actor: usize) -> Result<Grant<'_, Self>, MonitorError>
    where
        Self: Sized,
    {
        self.request(actor)?;
        Ok(Grant {
            monitor: self,
            actor,
            released: false,
        })
    }
}

pub struct Grant<'a, M: ResourceMonitor> {
    monitor: &'a M,
    actor: usize,
    // release() consumes self then drop() runs, so book-keep to not release twice
    released: bool,
}

impl<M: ResourceMonitor> Grant<'_, M> {
    pub fn actor(&self) -> usize {
        self.actor
    }
    pub fn release(mut self) -> Result<(), MonitorError> {
        self.released = true;
        self.monitor.release(self.actor)
    }
}

impl<M: ResourceMonitor> Drop for Grant<'_, M> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.monitor.release(self.actor) {
            error!(actor = self.actor, error = %e, "failed to release on drop");
        }
    }
}

/// One state change, with every actor's state right after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub seq: u64,
    pub actor: usize,
    pub from: ActorState,
    pub to: ActorState,
    pub states: Vec<ActorState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MonitorStats {
    pub grants: u64,
    pub releases: u64,
    /// Requests that were not granted immediately and had to block
    pub waits: u64,
}

pub fn left(actor: usize, n: usize) -> usize {
    (actor + n - 1) % n
}

pub fn right(actor: usize, n: usize) -> usize {
    (actor + 1) % n
}

pub fn adjacency_holds(states: &[ActorState]) -> bool {
    let n = states.len();
    states.iter().enumerate().all(|(i, s)| {
        *s != ActorState::Active
            // a lone actor is its own neighbor
            || n == 1
            || (states[left(i, n)] != ActorState::Active && states[right(i, n)] != ActorState::Active)
    })
}

#[cfg(test)]
mod tests {
    use crate::sync::{adjacency_holds, left, right, ActorState};

    #[test]
    fn ring_neighbors() {
        assert_eq!(left(0, 5), 4);
        assert_eq!(right(4, 5), 0);
        assert_eq!(left(3, 5), 2);
        assert_eq!(right(3, 5), 4);
        assert_eq!(left(0, 2), right(0, 2));
        assert_eq!(left(0, 1), 0);
    }

    #[test]
    fn legal_transitions() {
        use ActorState::*;
        assert!(Idle.can_transition_to(Waiting));
        assert!(Waiting.can_transition_to(Active));
        assert!(Active.can_transition_to(Idle));
        assert!(!Idle.can_transition_to(Active));
        assert!(!Active.can_transition_to(Waiting));
        assert!(!Idle.can_transition_to(Idle));
    }

    #[test]
    fn adjacency() {
        use ActorState::*;
        assert!(adjacency_holds(&[Active, Idle, Active, Idle, Waiting]));
        assert!(!adjacency_holds(&[Active, Active, Idle, Idle, Idle]));
        // wraps around
        assert!(!adjacency_holds(&[Active, Idle, Idle, Idle, Active]));
        assert!(adjacency_holds(&[Active]));
        assert!(!adjacency_holds(&[Active, Active]));
    }
}
