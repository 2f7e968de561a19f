use std::fmt;

/// Lifecycle of an agent's loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AgentState {
    /// Thread spawned, loop not yet accepting work
    Created = 0,
    /// Accepting and running tasks
    Running = 1,
    /// Draining queued tasks; new submissions are rejected
    Stopping = 2,
    /// Loop exited
    Stopped = 3,
}

impl AgentState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        *self == AgentState::Running
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentState::Created => write!(f, "created"),
            AgentState::Running => write!(f, "running"),
            AgentState::Stopping => write!(f, "stopping"),
            AgentState::Stopped => write!(f, "stopped"),
        }
    }
}
