// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure path simulation: walk the selection logic without touching any
//! instance, index, timer, or store.

use super::ExecutionEngine;
use crate::error::EngineError;
use sb_core::expr::EvalScope;
use sb_core::{guard, Clock, MachineEvent};
use serde_json::json;

/// Result of simulating an event sequence against a machine.
#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    pub ok: bool,
    /// States visited, starting at the initial state.
    pub path: Vec<String>,
    pub error: Option<String>,
}

impl<C: Clock> ExecutionEngine<C> {
    /// Walk `events` from the machine's initial state, applying
    /// transition selection and guards against an empty instance view.
    pub(crate) fn simulate_path(
        &self,
        machine_name: &str,
        events: &[MachineEvent],
    ) -> Result<Simulation, EngineError> {
        let machine = self
            .component
            .machine(machine_name)
            .ok_or_else(|| EngineError::UnknownMachine(machine_name.to_string()))?;

        let view = json!({});
        let mut state = machine.initial_state.clone();
        let mut path = vec![state.clone()];

        for event in events {
            if machine.state(&state).map(|s| s.is_terminal()).unwrap_or(false) {
                return Ok(Simulation {
                    ok: false,
                    path,
                    error: Some(format!(
                        "'{state}' is terminal; '{}' cannot be delivered",
                        event.event_type
                    )),
                });
            }
            let Some(transition) =
                super::transition::select_transition(machine, &state, event, &view)
            else {
                return Ok(Simulation {
                    ok: false,
                    path,
                    error: Some(format!(
                        "no transition from '{state}' on '{}'",
                        event.event_type
                    )),
                });
            };
            let scope = EvalScope::new(&event.payload, &view);
            if !guard::evaluate_all(&transition.guards, &scope) {
                return Ok(Simulation {
                    ok: false,
                    path,
                    error: Some(format!(
                        "guard denied transition from '{state}' on '{}'",
                        event.event_type
                    )),
                });
            }
            state = transition.to.clone();
            path.push(state.clone());
        }

        Ok(Simulation {
            ok: true,
            path,
            error: None,
        })
    }
}
