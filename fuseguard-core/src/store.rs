//! Device State Access
//!
//! Switch state, fault flags and the operation mode live in the firmware's
//! persistent state store. The pipeline reads the switch state and the flags
//! once per buffer and raises flags when the safety monitor reports a fault.
//! It never clears flags and never deletes anything.

use crate::safety::{ErrorState, FaultKind, SwitchState};

/// Device operation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperationMode {
    /// Not yet set up; readings are not published
    #[default]
    Setup,
    /// Normal operation
    Normal,
    /// Firmware update
    Dfu,
    /// Factory reset in progress
    FactoryReset,
}

/// The persistent state the pipeline depends on
pub trait StateStore {
    /// Current switch state
    fn switch_state(&self) -> SwitchState;

    /// Current fault flags
    fn error_state(&self) -> ErrorState;

    /// Persist a raised fault flag
    fn raise_error(&mut self, fault: FaultKind);

    /// Current operation mode
    fn operation_mode(&self) -> OperationMode;
}

/// In-memory state store for hosts and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    /// Switch state as last written by the switch driver
    pub switch: SwitchState,
    /// Fault flags
    pub errors: ErrorState,
    /// Operation mode
    pub mode: OperationMode,
}

impl MemoryStore {
    /// Store in normal operation with the given switch state
    pub fn normal(switch: SwitchState) -> Self {
        Self { switch, errors: ErrorState::CLEAR, mode: OperationMode::Normal }
    }

    /// External acknowledgement of a fault
    pub fn acknowledge(&mut self, fault: FaultKind) {
        self.errors.acknowledge(fault);
    }
}

impl StateStore for MemoryStore {
    fn switch_state(&self) -> SwitchState {
        self.switch
    }

    fn error_state(&self) -> ErrorState {
        self.errors
    }

    fn raise_error(&mut self, fault: FaultKind) {
        self.errors.raise(fault);
    }

    fn operation_mode(&self) -> OperationMode {
        self.mode
    }
}
