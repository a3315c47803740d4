//! Narrow external-collaborator seam for the on-device LCD menu (spec §9
//! "Polymorphism for screens"). The menu itself — draw, button, encoder
//! handling — lives outside the core; the dispatcher only ever needs to
//! hand it a read-only state snapshot on a fixed cadence.

use quill_common::state::MachineState;

pub trait UiScreen {
    /// Non-blocking; called once per dispatcher pass (and, during a long
    /// motion or homing block, at the ~150 ms cadence from spec §5).
    fn tick(&mut self, state: &MachineState);
}

/// The UI is an out-of-scope external collaborator; a headless build (or a
/// test) wires this in instead of a real screen driver.
#[derive(Debug, Default)]
pub struct NullUi;

impl UiScreen for NullUi {
    fn tick(&mut self, _state: &MachineState) {}
}
