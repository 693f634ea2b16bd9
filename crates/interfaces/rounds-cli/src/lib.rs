pub mod commands;

use clap::ValueEnum;
use rounds_core::ScheduleStatus;

/// The three transitions the operator surface offers. `Pending` is the
/// initial state only and is deliberately not selectable.
#[derive(ValueEnum, Clone, Debug, Copy)]
pub enum CliStatus {
    Completed,
    Missed,
    OnHold,
}

impl From<CliStatus> for ScheduleStatus {
    fn from(s: CliStatus) -> Self {
        match s {
            CliStatus::Completed => ScheduleStatus::Completed,
            CliStatus::Missed => ScheduleStatus::Missed,
            CliStatus::OnHold => ScheduleStatus::OnHold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_statuses_map_to_terminal_states() {
        for cli in [CliStatus::Completed, CliStatus::Missed, CliStatus::OnHold] {
            let status: ScheduleStatus = cli.into();
            assert!(status.is_terminal());
        }
    }
}
