//! Gait / sprint sync codes
//!
//! A closed set of integer codes. Each maps to exactly one state mutation that both the
//! deciding side and the receiving side apply through the same function.

use serde::{Deserialize, Serialize};

use crate::gait::Gait;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncCode {
    ForceWalk,
    SetCanter,
    SetGallop,
    SprintOn,
    SprintOff,
}

/// The mutation a code stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncAction {
    SetGait(Gait),
    SetSprinting(bool),
}

impl SyncCode {
    pub const ALL: [SyncCode; 5] = [
        SyncCode::ForceWalk,
        SyncCode::SetCanter,
        SyncCode::SetGallop,
        SyncCode::SprintOn,
        SyncCode::SprintOff,
    ];

    pub fn code(self) -> i32 {
        match self {
            SyncCode::ForceWalk => 9999,
            SyncCode::SetCanter => 9998,
            SyncCode::SetGallop => 9997,
            SyncCode::SprintOn => 4242,
            SyncCode::SprintOff => 2424,
        }
    }

    /// Unknown codes decode to `None` and are ignored by receivers.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    pub fn for_gait(gait: Gait) -> Self {
        match gait {
            Gait::Walk => SyncCode::ForceWalk,
            Gait::Canter => SyncCode::SetCanter,
            Gait::Gallop => SyncCode::SetGallop,
        }
    }

    pub fn for_sprint(sprinting: bool) -> Self {
        if sprinting {
            SyncCode::SprintOn
        } else {
            SyncCode::SprintOff
        }
    }

    pub fn action(self) -> SyncAction {
        match self {
            SyncCode::ForceWalk => SyncAction::SetGait(Gait::Walk),
            SyncCode::SetCanter => SyncAction::SetGait(Gait::Canter),
            SyncCode::SetGallop => SyncAction::SetGait(Gait::Gallop),
            SyncCode::SprintOn => SyncAction::SetSprinting(true),
            SyncCode::SprintOff => SyncAction::SetSprinting(false),
        }
    }
}
