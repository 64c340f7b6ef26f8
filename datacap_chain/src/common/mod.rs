mod error;

pub use error::{BridgeError as Error, RemoteErrorKind, Result};
