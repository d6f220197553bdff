use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::error::{LandlordError, Result};

/// Inbound request as published on the request channel.
///
/// Missing fields decode as empty strings; an empty `Id` is then rejected by
/// validation and still answered on the reply channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Instruction {
    pub reply_to: String,
    pub op: String,
    pub id: String,
}

impl Instruction {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    pub fn operation(&self) -> Result<Operation> {
        self.op.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Setup,
    Delete,
    GetPort,
}

impl FromStr for Operation {
    type Err = LandlordError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Setup" => Ok(Operation::Setup),
            "Delete" => Ok(Operation::Delete),
            "GetPort" => Ok(Operation::GetPort),
            _ => Err(LandlordError::validation("Unknown operation.")),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Setup => "Setup",
            Operation::Delete => "Delete",
            Operation::GetPort => "GetPort",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlainResponse {
    pub id: String,
    pub status: Status,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SetupResponse {
    pub id: String,
    pub status: Status,
    pub error: String,
    /// 0 when no port applies.
    pub port: u16,
}

/// One response is published per decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Setup(SetupResponse),
    Plain(PlainResponse),
}

impl Response {
    pub fn ok(id: &str) -> Self {
        Response::Plain(PlainResponse {
            id: id.to_string(),
            status: Status::Ok,
            error: String::new(),
        })
    }

    pub fn ok_with_port(id: &str, port: u16) -> Self {
        Response::Setup(SetupResponse {
            id: id.to_string(),
            status: Status::Ok,
            error: String::new(),
            port,
        })
    }

    /// Error shape for failures caught before or outside an operation.
    pub fn error(message: impl Into<String>) -> Self {
        Response::Plain(PlainResponse {
            id: String::new(),
            status: Status::Error,
            error: message.into(),
        })
    }

    /// Error shape for a routed operation, matching its success shape.
    pub fn operation_error(op: Operation, id: &str, message: impl Into<String>) -> Self {
        match op {
            Operation::Setup | Operation::GetPort => Response::Setup(SetupResponse {
                id: id.to_string(),
                status: Status::Error,
                error: message.into(),
                port: 0,
            }),
            Operation::Delete => Response::Plain(PlainResponse {
                id: id.to_string(),
                status: Status::Error,
                error: message.into(),
            }),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Response::Setup(r) => r.status,
            Response::Plain(r) => r.status,
        }
    }

    pub fn error_message(&self) -> &str {
        match self {
            Response::Setup(r) => &r.error,
            Response::Plain(r) => &r.error,
        }
    }

    pub fn port(&self) -> Option<u16> {
        match self {
            Response::Setup(r) => Some(r.port),
            Response::Plain(_) => None,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantBinding {
    pub id: String,
    pub port: u16,
}
