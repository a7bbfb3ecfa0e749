//! Bookkeeping for one saga execution.

use common::SagaId;
use serde::Serialize;

use crate::error::Result;
use crate::state::SagaState;

/// Which cart workflow a saga runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CartSagaKind {
    AddItem,
    RemoveItem,
}

impl CartSagaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CartSagaKind::AddItem => "add_item",
            CartSagaKind::RemoveItem => "remove_item",
        }
    }
}

/// One execution of a cart saga.
///
/// Records the completed forward steps so compensation can undo them in
/// reverse order. Instances live only for the duration of a request.
#[derive(Debug, Clone, Serialize)]
pub struct SagaInstance {
    id: SagaId,
    kind: CartSagaKind,
    state: SagaState,
    completed_steps: Vec<&'static str>,
    compensated_steps: Vec<&'static str>,
    failure_reason: Option<String>,
}

impl SagaInstance {
    pub fn new(kind: CartSagaKind) -> Self {
        Self {
            id: SagaId::new(),
            kind,
            state: SagaState::NotStarted,
            completed_steps: Vec::new(),
            compensated_steps: Vec::new(),
            failure_reason: None,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        self.state = self.state.transition(SagaState::Running)?;
        Ok(())
    }

    pub fn step_completed(&mut self, step: &'static str) {
        self.completed_steps.push(step);
    }

    /// Enters compensation after `step` failed with `reason`.
    pub fn begin_compensation(&mut self, step: &'static str, reason: impl Into<String>) -> Result<()> {
        self.state = self.state.transition(SagaState::Compensating)?;
        self.failure_reason = Some(format!("{step}: {}", reason.into()));
        Ok(())
    }

    pub fn step_compensated(&mut self, step: &'static str) {
        self.compensated_steps.push(step);
    }

    pub fn complete(&mut self) -> Result<()> {
        self.state = self.state.transition(SagaState::Completed)?;
        Ok(())
    }

    pub fn fail(&mut self) -> Result<()> {
        self.state = self.state.transition(SagaState::Failed)?;
        Ok(())
    }

    pub fn id(&self) -> SagaId {
        self.id
    }

    pub fn kind(&self) -> CartSagaKind {
        self.kind
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    pub fn completed_steps(&self) -> &[&'static str] {
        &self.completed_steps
    }

    pub fn compensated_steps(&self) -> &[&'static str] {
        &self.compensated_steps
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }
}
