//! Messages exchanged over the bus and pushed to observers.
//!
//! - [`JobQueuedEvent`]: submission path -> external agent, on [`JOB_QUEUE_TOPIC`].
//! - [`JobUpdateEvent`]: external agent -> relay worker, on [`JOB_UPDATES_TOPIC`].
//! - [`JobUpdateBroadcast`]: relay worker -> observers, one text frame per update.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::job::{empty_result, JobStatus};
use crate::types::JobId;

/// Topic the submission path publishes new jobs on.
pub const JOB_QUEUE_TOPIC: &str = "job_queue";

/// Topic the external agent publishes status updates on.
pub const JOB_UPDATES_TOPIC: &str = "job_updates";

/// Discriminator carried by every [`JobUpdateBroadcast`].
pub const JOB_UPDATE_TYPE: &str = "JOB_UPDATE";

/// Announces a freshly created job to the external agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobQueuedEvent {
    pub job_id: JobId,
    pub task: String,
    pub swarm_id: String,
}

/// A status update for a job, as produced by the external agent.
///
/// Unknown keys (the agent also sends a `timestamp`) are ignored. A missing
/// or `null` result is treated as the empty object; any other non-object
/// result fails to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobUpdateEvent {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(default = "empty_result", deserialize_with = "object_or_empty")]
    pub result: serde_json::Value,
}

impl JobUpdateEvent {
    /// Decode an update from a raw bus payload.
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

fn object_or_empty<'de, D>(deserializer: D) -> Result<serde_json::Value, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None => Ok(empty_result()),
        Some(value @ serde_json::Value::Object(_)) => Ok(value),
        Some(other) => Err(D::Error::custom(format!(
            "result must be a JSON object, got {other}"
        ))),
    }
}

/// The frame observers receive for every relayed update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobUpdateBroadcast {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub job_id: JobId,
    pub status: JobStatus,
    pub data: serde_json::Value,
}

impl From<JobUpdateEvent> for JobUpdateBroadcast {
    fn from(event: JobUpdateEvent) -> Self {
        Self {
            kind: JOB_UPDATE_TYPE,
            job_id: event.job_id,
            status: event.status,
            data: event.result,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const JOB: &str = "7f8e2a4c-1b3d-4e5f-8a9b-0c1d2e3f4a5b";

    #[test]
    fn decode_update_from_agent_payload() {
        let payload = json!({
            "job_id": JOB,
            "status": "completed",
            "result": {"output": "hi"},
            "timestamp": "now",
        });
        let event = JobUpdateEvent::decode(payload.to_string().as_bytes()).unwrap();

        assert_eq!(event.job_id.to_string(), JOB);
        assert_eq!(event.status, JobStatus::Completed);
        assert_eq!(event.result, json!({"output": "hi"}));
    }

    #[test]
    fn missing_or_null_result_becomes_empty_object() {
        let missing = json!({"job_id": JOB, "status": "processing"});
        let null = json!({"job_id": JOB, "status": "processing", "result": null});

        for payload in [missing, null] {
            let event = JobUpdateEvent::decode(payload.to_string().as_bytes()).unwrap();
            assert_eq!(event.result, json!({}));
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(JobUpdateEvent::decode(b"{not json").is_err());
        assert!(JobUpdateEvent::decode(br#"{"job_id":"nope","status":"queued"}"#).is_err());
        assert!(JobUpdateEvent::decode(
            format!(r#"{{"job_id":"{JOB}","status":"exploded"}}"#).as_bytes()
        )
        .is_err());
    }

    #[test]
    fn decode_rejects_non_object_result() {
        for result in [json!([1, 2]), json!("oops"), json!(42), json!(true)] {
            let payload = json!({"job_id": JOB, "status": "completed", "result": result});
            assert!(
                JobUpdateEvent::decode(payload.to_string().as_bytes()).is_err(),
                "result {result} should be rejected",
            );
        }
    }

    #[test]
    fn broadcast_matches_observer_wire_shape() {
        let event = JobUpdateEvent {
            job_id: JOB.parse().unwrap(),
            status: JobStatus::Processing,
            result: json!({}),
        };
        let value = serde_json::to_value(JobUpdateBroadcast::from(event)).unwrap();

        assert_eq!(
            value,
            json!({
                "type": "JOB_UPDATE",
                "job_id": JOB,
                "status": "processing",
                "data": {},
            })
        );
    }
}
