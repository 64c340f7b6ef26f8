use std::fmt;

/// Errors raised while bridging HTTP deal requests to the full node.
///
/// The `Display` output carries full detail and is meant for logs only;
/// HTTP callers only ever see [`BridgeError::code`].
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid request: {0}")]
    RequestValidation(String),

    #[error("{method} failed: {kind}")]
    RemoteCall {
        method: &'static str,
        kind: RemoteErrorKind,
    },

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a call to the node API failed.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteErrorKind {
    /// The request never produced an HTTP response.
    Transport(String),
    /// The node answered with a non-success HTTP status.
    Status(u16),
    /// The node answered with a JSON-RPC error object.
    Rpc { code: i64, message: String },
    /// The node's answer could not be decoded.
    Decode(String),
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteErrorKind::Transport(msg) => write!(f, "transport: {}", msg),
            RemoteErrorKind::Status(status) => write!(f, "http status {}", status),
            RemoteErrorKind::Rpc { code, message } => write!(f, "rpc error {}: {}", code, message),
            RemoteErrorKind::Decode(msg) => write!(f, "decode: {}", msg),
        }
    }
}

impl BridgeError {
    pub fn remote(method: &'static str, kind: RemoteErrorKind) -> Self {
        BridgeError::RemoteCall { method, kind }
    }

    /// Short, stable identifier that is safe to hand to HTTP callers.
    pub fn code(&self) -> String {
        match self {
            BridgeError::Connection(_) => "node connection failed".to_string(),
            BridgeError::RequestValidation(_) => "invalid request".to_string(),
            BridgeError::RemoteCall { kind, .. } => match kind {
                RemoteErrorKind::Transport(_) => "node unreachable".to_string(),
                RemoteErrorKind::Status(status) => format!("node http {}", status),
                RemoteErrorKind::Rpc { code, .. } => format!("rpc error {}", code),
                RemoteErrorKind::Decode(_) => "bad node response".to_string(),
            },
            BridgeError::Encoding(_) => "encoding failed".to_string(),
            BridgeError::Config(_) => "bad config".to_string(),
            BridgeError::Io(_) => "io error".to_string(),
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Encoding(err.to_string())
    }
}

impl From<serde_yaml::Error> for BridgeError {
    fn from(err: serde_yaml::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_does_not_leak_detail() {
        let err = BridgeError::remote(
            "Filecoin.ClientStatelessDeal",
            RemoteErrorKind::Rpc {
                code: 1,
                message: "miner f01234 rejected proposal: insufficient funds in wallet f1secret".to_string(),
            },
        );
        assert_eq!(err.code(), "rpc error 1");
        assert!(err.to_string().contains("f1secret"));
        assert!(!err.code().contains("f1secret"));

        let err = BridgeError::Connection("dial tcp 10.0.0.7:1234: connection refused".to_string());
        assert_eq!(err.code(), "node connection failed");
    }

    #[test]
    fn test_status_code_is_reported() {
        let err = BridgeError::remote("Filecoin.Version", RemoteErrorKind::Status(401));
        assert_eq!(err.code(), "node http 401");
        assert_eq!(err.to_string(), "Filecoin.Version failed: http status 401");
    }
}
