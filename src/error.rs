use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open attendance store {endpoint}: {source}")]
    Open {
        endpoint: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Store query failed ({operation}): {source}")]
    Query {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Store constraint violated ({operation}): {source}")]
    Constraint {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Store transaction failed: {0}")]
    Transaction(#[source] rusqlite::Error),

    #[error("Failed to prepare store directory: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn from_query(operation: &'static str, source: rusqlite::Error) -> Self {
        let is_constraint = matches!(
            source.sqlite_error_code(),
            Some(rusqlite::ErrorCode::ConstraintViolation)
        );

        if is_constraint {
            Self::Constraint { operation, source }
        } else {
            Self::Query { operation, source }
        }
    }

    pub fn is_constraint(&self) -> bool {
        matches!(self, Self::Constraint { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MacAddressError {
    #[error("Invalid MAC address: {0:?}. Example: AA:BB:CC:DD:EE:FF")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error(transparent)]
    InvalidMac(#[from] MacAddressError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Invalid address range: {0}. Example: 192.168.0.1/24")]
    InvalidRange(String),

    #[error("Network interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("Network interface {0} has no IPv4 address")]
    NoIpv4Address(String),

    #[error("Network interface {0} has no hardware address")]
    NoHardwareAddress(String),

    #[error("Failed to open datalink channel on {interface}: {reason}")]
    Channel { interface: String, reason: String },

    #[error("Failed to send ARP request: {0}")]
    Send(#[source] std::io::Error),
}
