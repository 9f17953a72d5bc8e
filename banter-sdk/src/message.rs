//! Wire message taxonomy for the banter chat protocol.
//!
//! Every frame on the wire is one JSON object carrying a numeric `type`
//! discriminant. Incoming frames are decoded into a generic [`Envelope`]
//! first; each listener filters on [`Envelope::msg_type`] and decodes the
//! typed payload it cares about. Responses additionally carry a numeric
//! [`Status`]; a non-ok status never carries payload data beyond itself.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtoError;

/// Message `type` discriminants, shared by requests and responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum MsgType {
    LoginRequest = 1,
    LoginResponse = 2,
    PostMessageRequest = 3,
    PostMessageResponse = 4,
    ChatMessage = 5,
    OnlineUsersRequest = 6,
    OnlineUsersResponse = 7,
}

impl From<MsgType> for u8 {
    fn from(msg_type: MsgType) -> u8 {
        msg_type as u8
    }
}

impl TryFrom<u8> for MsgType {
    type Error = ProtoError;

    fn try_from(raw: u8) -> Result<Self, ProtoError> {
        match raw {
            1 => Ok(Self::LoginRequest),
            2 => Ok(Self::LoginResponse),
            3 => Ok(Self::PostMessageRequest),
            4 => Ok(Self::PostMessageResponse),
            5 => Ok(Self::ChatMessage),
            6 => Ok(Self::OnlineUsersRequest),
            7 => Ok(Self::OnlineUsersResponse),
            other => Err(ProtoError::UnknownType(other)),
        }
    }
}

/// Status codes carried by every response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Status {
    Ok = 1,
    InvalidToken = 2,
    NameTaken = 3,
    NameEmpty = 4,
    NameTooLong = 5,
    MessageEmpty = 6,
    MessageTooLong = 7,
}

impl Status {
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> u8 {
        status as u8
    }
}

impl TryFrom<u8> for Status {
    type Error = ProtoError;

    fn try_from(raw: u8) -> Result<Self, ProtoError> {
        match raw {
            1 => Ok(Self::Ok),
            2 => Ok(Self::InvalidToken),
            3 => Ok(Self::NameTaken),
            4 => Ok(Self::NameEmpty),
            5 => Ok(Self::NameTooLong),
            6 => Ok(Self::MessageEmpty),
            7 => Ok(Self::MessageTooLong),
            other => Err(ProtoError::UnknownStatus(other)),
        }
    }
}

/// One decoded wire message: a JSON object keyed by field name.
///
/// The `type` discriminant is read with [`Envelope::msg_type`]; an envelope
/// whose discriminant is missing or unknown is skipped by every listener
/// rather than treated as an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Envelope(Map<String, Value>);

impl Envelope {
    /// Parse one text frame. Fails when the frame is not a JSON object.
    pub fn from_json(raw: &str) -> Result<Self, ProtoError> {
        Ok(Self(serde_json::from_str(raw)?))
    }

    /// Wrap a typed message for dispatch or re-encoding.
    pub fn encode<T: Serialize>(message: &T) -> Result<Self, ProtoError> {
        match serde_json::to_value(message)? {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(ProtoError::NotAnObject),
        }
    }

    /// The `type` discriminant, if present and known.
    pub fn msg_type(&self) -> Option<MsgType> {
        self.0
            .get("type")
            .and_then(Value::as_u64)
            .and_then(|raw| u8::try_from(raw).ok())
            .and_then(|raw| MsgType::try_from(raw).ok())
    }

    /// Decode the full envelope into a typed message.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ProtoError> {
        Ok(serde_json::from_value(Value::Object(self.0.clone()))?)
    }

    pub fn to_json(&self) -> Result<String, ProtoError> {
        Ok(serde_json::to_string(&self.0)?)
    }
}

/// Login request carrying the desired nickname.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "type")]
    pub msg_type: MsgType,
    pub nickname: String,
}

impl LoginRequest {
    pub fn new(nickname: impl Into<String>) -> Self {
        Self {
            msg_type: MsgType::LoginRequest,
            nickname: nickname.into(),
        }
    }
}

/// Login response carrying the bearer token on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "type")]
    pub msg_type: MsgType,
    #[serde(default)]
    pub token: String,
    pub status: Status,
}

/// Post-message request, authenticated by the bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMessageRequest {
    #[serde(rename = "type")]
    pub msg_type: MsgType,
    pub token: String,
    pub msg: String,
}

impl PostMessageRequest {
    pub fn new(token: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            msg_type: MsgType::PostMessageRequest,
            token: token.into(),
            msg: msg.into(),
        }
    }
}

/// Server acknowledgement for a posted message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMessageResponse {
    #[serde(rename = "type")]
    pub msg_type: MsgType,
    pub status: Status,
}

/// A chat line pushed by the server for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(rename = "type")]
    pub msg_type: MsgType,
    pub nickname: String,
    pub msg: String,
    #[serde(rename = "isSystem")]
    pub is_system: bool,
}

/// Online-users request, authenticated by the bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineUsersRequest {
    #[serde(rename = "type")]
    pub msg_type: MsgType,
    pub token: String,
}

impl OnlineUsersRequest {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            msg_type: MsgType::OnlineUsersRequest,
            token: token.into(),
        }
    }
}

/// Online-users response. `users` is absent when the status is not ok.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineUsersResponse {
    #[serde(rename = "type")]
    pub msg_type: MsgType,
    pub status: Status,
    #[serde(default)]
    pub users: Vec<String>,
}
