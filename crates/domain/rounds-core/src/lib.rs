use serde::{Deserialize, Serialize};

pub mod date;
pub mod status;

pub use date::ServiceDate;
pub use status::ScheduleStatus;

/// A single collection stop, in the camelCase wire form the remote
/// document store uses. `schedule_id` is the document id and is stable
/// across syncs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PickupSchedule {
    pub schedule_id: String,
    pub area_info: String,
    pub pickup_date: ServiceDate,
    pub status: ScheduleStatus,
    pub assigned_collector_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// UTC `YYYY-MM-DD HH:MM:SS`, set whenever status leaves `Pending`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// A status-change intent that could not be committed remotely.
///
/// Created when a remote commit fails, removed only after a successful
/// replay, never mutated in place. At most one entry exists per
/// `schedule_id`; a later enqueue for the same id replaces the payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingUpdate {
    pub schedule_id: String,
    pub status: ScheduleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Original intended commit time.
    pub timestamp: String,
    /// When the intent was recorded locally.
    pub queued_at: String,
}

impl PendingUpdate {
    pub fn patch(&self) -> StatusPatch {
        StatusPatch {
            status: self.status,
            reason: self.reason.clone(),
            timestamp: self.timestamp.clone(),
        }
    }
}

/// Partial-fields payload committed to a schedule document on a status
/// change. Committing the same patch twice is a no-op overwrite, which is
/// what makes queue replay safe to repeat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusPatch {
    pub status: ScheduleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub timestamp: String,
}

impl StatusPatch {
    /// Apply the same mutation locally that the patch describes remotely.
    pub fn apply_to(&self, schedule: &mut PickupSchedule) {
        schedule.status = self.status;
        schedule.reason = self.reason.clone();
        schedule.timestamp = Some(self.timestamp.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PickupSchedule {
        PickupSchedule {
            schedule_id: "sched-1".into(),
            area_info: "Harbor Market Row".into(),
            pickup_date: "2025-05-30".parse().unwrap(),
            status: ScheduleStatus::Pending,
            assigned_collector_id: "collector123".into(),
            reason: None,
            timestamp: None,
        }
    }

    #[test]
    fn schedule_serializes_camel_case_and_omits_absent_fields() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["scheduleId"], "sched-1");
        assert_eq!(json["pickupDate"], "2025-05-30");
        assert_eq!(json["assignedCollectorId"], "collector123");
        assert!(json.get("reason").is_none());
        assert!(json.get("timestamp").is_none());
    }

    #[test]
    fn patch_apply_mirrors_remote_mutation() {
        let mut schedule = sample();
        let patch = StatusPatch {
            status: ScheduleStatus::Missed,
            reason: Some("road closed".into()),
            timestamp: "2025-05-30 09:12:00".into(),
        };
        patch.apply_to(&mut schedule);
        assert_eq!(schedule.status, ScheduleStatus::Missed);
        assert_eq!(schedule.reason.as_deref(), Some("road closed"));
        assert_eq!(schedule.timestamp.as_deref(), Some("2025-05-30 09:12:00"));
    }

    #[test]
    fn pending_update_round_trips_with_on_hold_status() {
        let update = PendingUpdate {
            schedule_id: "sched-2".into(),
            status: ScheduleStatus::OnHold,
            reason: Some("gate locked".into()),
            timestamp: "2025-05-30 10:00:00".into(),
            queued_at: "2025-05-30T10:00:02Z".into(),
        };
        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains("\"On Hold\""));
        assert!(json.contains("\"queuedAt\""));
        let back: PendingUpdate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, update);
    }
}
