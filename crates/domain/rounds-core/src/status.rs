use serde::{Deserialize, Serialize};

/// Lifecycle state of a pickup stop.
///
/// `Pending` is the initial state. The other three are terminal for the
/// day; no transition back to `Pending` is defined.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScheduleStatus {
    Pending,
    Completed,
    Missed,
    // The remote store spells this with a space.
    #[serde(rename = "On Hold")]
    OnHold,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Pending => "Pending",
            ScheduleStatus::Completed => "Completed",
            ScheduleStatus::Missed => "Missed",
            ScheduleStatus::OnHold => "On Hold",
        }
    }

    /// Missed and On Hold carry an operator-supplied reason. Enforced at
    /// the calling boundary, not here.
    pub fn requires_reason(&self) -> bool {
        matches!(self, ScheduleStatus::Missed | ScheduleStatus::OnHold)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScheduleStatus::Pending)
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown schedule status: {0}")]
pub struct ParseStatusError(String);

impl std::str::FromStr for ScheduleStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(ScheduleStatus::Pending),
            "Completed" => Ok(ScheduleStatus::Completed),
            "Missed" => Ok(ScheduleStatus::Missed),
            "On Hold" => Ok(ScheduleStatus::OnHold),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}
