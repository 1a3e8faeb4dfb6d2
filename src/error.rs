use crate::sync::ActorState;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MonitorError {
    #[error("monitor needs at least one actor")]
    NoActors,
    #[error("actor {actor} is outside 0..{actors}")]
    UnknownActor { actor: usize, actors: usize },
    #[error("actor {actor} requested while {state:?}, expected Idle")]
    NotIdle { actor: usize, state: ActorState },
    #[error("actor {actor} released while {state:?}, expected Active")]
    NotActive { actor: usize, state: ActorState },
    #[error("actor {actor} was interrupted while waiting")]
    Interrupted { actor: usize },
}

impl MonitorError {
    /// Caller bugs, as opposed to runtime conditions like shutdown.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            MonitorError::UnknownActor { .. }
                | MonitorError::NotIdle { .. }
                | MonitorError::NotActive { .. }
        )
    }
}
