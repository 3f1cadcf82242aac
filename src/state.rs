//! Open/closed state machine driven by periodic evaluation
//!
//! The machine starts `Unresolved` so nothing state-dependent is shown before
//! the first evaluation. It has no terminal state.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GateState {
    Unresolved,
    Open,
    Closed,
}

impl GateState {
    pub fn from_closed(closed: bool) -> Self {
        if closed {
            GateState::Closed
        } else {
            GateState::Open
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GateState::Unresolved => "unresolved",
            GateState::Open => "open",
            GateState::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transition {
    pub from: GateState,
    pub to: GateState,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GateMachine {
    state: GateState,
}

impl Default for GateMachine {
    fn default() -> Self {
        Self {
            state: GateState::Unresolved,
        }
    }
}

impl GateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_resolved(&self) -> bool {
        self.state != GateState::Unresolved
    }

    /// Feed one evaluation. Returns the transition if the state changed.
    pub fn observe(&mut self, closed: bool) -> Option<Transition> {
        let next = GateState::from_closed(closed);
        if next == self.state {
            return None;
        }
        let transition = Transition {
            from: self.state,
            to: next,
        };
        self.state = next;
        Some(transition)
    }
}
