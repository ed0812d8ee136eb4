// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-decision state machine.
//!
//! `Pending -> Routed(path) -> {Succeeded, Degraded, Failed}`. A pending
//! decision may also fail directly when its caller abandons it.

use switchyard_core::{DecisionState, RoutePath, SwitchyardError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionFsm {
    state: DecisionState,
    path: Option<RoutePath>,
}

impl Default for DecisionFsm {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionFsm {
    pub fn new() -> Self {
        Self {
            state: DecisionState::Pending,
            path: None,
        }
    }

    pub fn state(&self) -> DecisionState {
        self.state
    }

    pub fn path(&self) -> Option<RoutePath> {
        self.path
    }

    pub fn route(&mut self, path: RoutePath) -> Result<(), SwitchyardError> {
        match self.state {
            DecisionState::Pending => {
                self.state = DecisionState::Routed(path);
                self.path = Some(path);
                Ok(())
            }
            other => Err(invalid(other, "routed")),
        }
    }

    pub fn succeed(&mut self) -> Result<(), SwitchyardError> {
        self.finish(DecisionState::Succeeded)
    }

    /// A degraded answer was served instead of the routed one.
    pub fn degrade(&mut self) -> Result<(), SwitchyardError> {
        self.finish(DecisionState::Degraded)?;
        self.path = Some(RoutePath::Degraded);
        Ok(())
    }

    /// Nothing could be served. The path becomes `degraded`.
    pub fn fail(&mut self) -> Result<(), SwitchyardError> {
        match self.state {
            DecisionState::Pending | DecisionState::Routed(_) => {
                self.state = DecisionState::Failed;
                self.path = Some(RoutePath::Degraded);
                Ok(())
            }
            other => Err(invalid(other, "failed")),
        }
    }

    fn finish(&mut self, terminal: DecisionState) -> Result<(), SwitchyardError> {
        match self.state {
            DecisionState::Routed(_) => {
                self.state = terminal;
                Ok(())
            }
            other => Err(invalid(other, &terminal.to_string())),
        }
    }
}

fn invalid(from: DecisionState, to: &str) -> SwitchyardError {
    SwitchyardError::Internal(format!("invalid decision transition {from} -> {to}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut fsm = DecisionFsm::new();
        fsm.route(RoutePath::Cache).unwrap();
        assert_eq!(fsm.state(), DecisionState::Routed(RoutePath::Cache));
        fsm.succeed().unwrap();
        assert!(fsm.state().is_terminal());
        assert_eq!(fsm.path(), Some(RoutePath::Cache));
    }

    #[test]
    fn degrade_rewrites_path() {
        let mut fsm = DecisionFsm::new();
        fsm.route(RoutePath::Provider).unwrap();
        fsm.degrade().unwrap();
        assert_eq!(fsm.state(), DecisionState::Degraded);
        assert_eq!(fsm.path(), Some(RoutePath::Degraded));
    }

    #[test]
    fn cannot_succeed_without_routing() {
        let mut fsm = DecisionFsm::new();
        assert!(fsm.succeed().is_err());
        assert!(fsm.degrade().is_err());
    }

    #[test]
    fn terminal_states_are_final() {
        let mut fsm = DecisionFsm::new();
        fsm.route(RoutePath::Local).unwrap();
        fsm.succeed().unwrap();
        assert!(fsm.route(RoutePath::Cache).is_err());
        assert!(fsm.fail().is_err());
    }

    #[test]
    fn pending_can_fail_directly() {
        let mut fsm = DecisionFsm::new();
        fsm.fail().unwrap();
        assert_eq!(fsm.state(), DecisionState::Failed);
        assert_eq!(fsm.path(), Some(RoutePath::Degraded));
    }
}
