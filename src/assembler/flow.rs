use anyhow::Result;

use super::PackageResult;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    Selecting,
    Resolving,
    Submitting,
    Succeeded { archive: String },
    Failed { message: String },
}

/// One "create extension" interaction.
///
/// `Idle -> Selecting -> [Resolving ->] Submitting -> Succeeded | Failed`, and
/// `dismiss` returns a finished (or abandoned) flow to `Idle`.
#[derive(Debug)]
pub struct ExtensionFlow {
    state: FlowState,
}

impl Default for ExtensionFlow {
    fn default() -> Self {
        Self {
            state: FlowState::Idle,
        }
    }
}

impl ExtensionFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            FlowState::Succeeded { .. } | FlowState::Failed { .. }
        )
    }

    fn advance(&mut self, allowed: bool, next: FlowState) -> Result<()> {
        if !allowed {
            anyhow::bail!("cannot move extension flow from {:?} to {:?}", self.state, next);
        }
        tracing::debug!(from = ?self.state, to = ?next, "extension flow");
        self.state = next;
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        let ok = self.state == FlowState::Idle;
        self.advance(ok, FlowState::Selecting)
    }

    pub fn resolving(&mut self) -> Result<()> {
        let ok = self.state == FlowState::Selecting;
        self.advance(ok, FlowState::Resolving)
    }

    pub fn submit(&mut self) -> Result<()> {
        let ok = matches!(self.state, FlowState::Selecting | FlowState::Resolving);
        self.advance(ok, FlowState::Submitting)
    }

    pub fn finish(&mut self, result: &Result<PackageResult>) -> Result<()> {
        let ok = self.state == FlowState::Submitting;
        let next = match result {
            Ok(p) => FlowState::Succeeded {
                archive: p.file_name(),
            },
            Err(err) => FlowState::Failed {
                message: format!("{:#}", err),
            },
        };
        self.advance(ok, next)
    }

    /// Closes the dialog. Not possible while a request is in flight.
    pub fn dismiss(&mut self) -> Result<()> {
        let ok = matches!(
            self.state,
            FlowState::Selecting | FlowState::Succeeded { .. } | FlowState::Failed { .. }
        );
        self.advance(ok, FlowState::Idle)
    }
}
