use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::smartgen_api::models::genset_status::GensetStatus;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GensetAction {
    Start,
    Stop,
    SetAuto,
    SetManual,
    CloseGensetBreaker,
    OpenGensetBreaker,
    CloseMainsBreaker,
    OpenMainsBreaker,
}

impl GensetAction {
    /// Value of the `act` field understood by the vendor backend.
    pub fn vendor_code(self) -> &'static str {
        match self {
            GensetAction::Start => "start",
            GensetAction::Stop => "stop",
            GensetAction::SetAuto => "auto",
            GensetAction::SetManual => "manual",
            // breakers only expose a toggle
            GensetAction::CloseGensetBreaker | GensetAction::OpenGensetBreaker => "gensetcloseopen",
            GensetAction::CloseMainsBreaker | GensetAction::OpenMainsBreaker => "maincloseopen",
        }
    }

    pub fn is_toggle(self) -> bool {
        matches!(
            self,
            GensetAction::CloseGensetBreaker
                | GensetAction::OpenGensetBreaker
                | GensetAction::CloseMainsBreaker
                | GensetAction::OpenMainsBreaker
        )
    }

    /// True when sending this toggle would move the breaker away from the
    /// requested position.
    pub fn already_satisfied(self, status: &GensetStatus) -> bool {
        match self {
            GensetAction::CloseGensetBreaker => status.genset_breaker_closed,
            GensetAction::OpenGensetBreaker => !status.genset_breaker_closed,
            GensetAction::CloseMainsBreaker => status.mains_breaker_closed,
            GensetAction::OpenMainsBreaker => !status.mains_breaker_closed,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GensetAction::Start => "start",
            GensetAction::Stop => "stop",
            GensetAction::SetAuto => "set_auto",
            GensetAction::SetManual => "set_manual",
            GensetAction::CloseGensetBreaker => "close_genset_breaker",
            GensetAction::OpenGensetBreaker => "open_genset_breaker",
            GensetAction::CloseMainsBreaker => "close_mains_breaker",
            GensetAction::OpenMainsBreaker => "open_mains_breaker",
        }
    }
}

impl Display for GensetAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
