use std::fmt;

use rand::Rng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{dataset::TrainItem, optimization::GradAlgorithm};

/// Correlates a task with every message emitted on its behalf.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// A random GUID shaped id (version 4 layout).
    pub fn random() -> Self {
        let mut bytes: [u8; 16] = rand::rng().random();
        bytes[6] = (bytes[6] & 0x0f) | 0x40;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;

        let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
        Self(format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Request,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Train a network, answered by one final response.
    TrainGradAlgorithm,
    /// Progress of a running training, one per epoch.
    TrainGradAlgorithmStatus,
}

/// The envelope exchanged between the pool and its execution units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub action: Action,
    pub body: Value,
}

impl Message {
    /// Builds a request with a fresh id.
    pub fn request<B: Serialize>(action: Action, body: &B) -> serde_json::Result<Self> {
        Ok(Self {
            id: TaskId::random(),
            kind: MessageType::Request,
            action,
            body: serde_json::to_value(body)?,
        })
    }

    /// Builds a response correlated with the request `id`.
    pub fn response<B: Serialize>(id: TaskId, action: Action, body: &B) -> serde_json::Result<Self> {
        Ok(Self {
            id,
            kind: MessageType::Response,
            action,
            body: serde_json::to_value(body)?,
        })
    }

    /// Decodes the body as `B`.
    pub fn body<B: DeserializeOwned>(&self) -> serde_json::Result<B> {
        B::deserialize(&self.body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Waiting,
    Running,
    Complete,
}

/// A unit of work tracked by the pool.
///
/// The pool publishes every message an execution unit emits wrapped in a task carrying the
/// id and the status of the originating request. `Complete` is published exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub status: TaskStatus,
    pub message: Message,
}

impl Task {
    pub fn new(message: Message) -> Self {
        Self {
            id: message.id.clone(),
            status: TaskStatus::Waiting,
            message,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == TaskStatus::Complete
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainArgs {
    pub algorithm: GradAlgorithm,
    pub train_set: Vec<TrainItem>,
    pub epochs: usize,
}

/// Body of a `train-grad-algorithm` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainRequest {
    pub serialized_network: String,
    pub args: TrainArgs,
}

/// Body of the final `train-grad-algorithm` response.
///
/// Carries the trained network, or why there is none.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainResponse {
    #[serde(default)]
    pub serialized_network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

impl TrainResponse {
    pub fn trained(serialized_network: String) -> Self {
        Self {
            serialized_network: Some(serialized_network),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn cancelled() -> Self {
        Self {
            cancelled: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn random_ids_look_like_guids() {
        let id = TaskId::random();
        let groups: Vec<_> = id.as_str().split('-').map(str::len).collect();
        assert_eq!(groups, [8, 4, 4, 4, 12]);
        assert_eq!(&id.as_str()[14..15], "4");
        assert_ne!(id, TaskId::random());
    }

    #[test]
    fn envelope_wire_format() {
        let request = TrainRequest {
            serialized_network: "[]".into(),
            args: TrainArgs {
                algorithm: GradAlgorithm::BackProp,
                train_set: vec![TrainItem::new(vec![1.], vec![0.])],
                epochs: 3,
            },
        };
        let message = Message::request(Action::TrainGradAlgorithm, &request).unwrap();
        let task = Task::new(message.clone());
        assert_eq!(task.id, message.id);

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["status"], "WAITING");
        assert_eq!(json["message"]["type"], "REQUEST");
        assert_eq!(json["message"]["action"], "train-grad-algorithm");
        assert_eq!(json["message"]["id"], json!(message.id.as_str()));
        assert_eq!(json["message"]["body"]["args"]["algorithm"], "BACK_PROP");
        assert_eq!(json["message"]["body"]["args"]["trainSet"][0]["targets"], json!([0.]));

        let decoded: TrainRequest = message.body().unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn status_action_is_kebab_case() {
        let json = serde_json::to_value(Action::TrainGradAlgorithmStatus).unwrap();
        assert_eq!(json, "train-grad-algorithm-status");
    }

    #[test]
    fn response_without_network_decodes() {
        let message = Message {
            id: "abc".into(),
            kind: MessageType::Response,
            action: Action::TrainGradAlgorithm,
            body: json!({ "serializedNetwork": null }),
        };

        let response: TrainResponse = message.body().unwrap();
        assert_eq!(response, TrainResponse::default());
    }
}
