// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

pub type Result<T> = std::result::Result<T, ZkError>;

/// Error codes delivered through a deferred completion.
///
/// The numeric values match the ones used by ZooKeeper clients so callers
/// that switch on codes keep working against the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    NoNode,
    NodeExists,
    NotEmpty,
    NoChildrenForEphemerals,
    BadVersion,
}

impl ErrorCode {
    pub fn code(self) -> i32 {
        match self {
            ErrorCode::NoNode => -101,
            ErrorCode::BadVersion => -103,
            ErrorCode::NoChildrenForEphemerals => -108,
            ErrorCode::NodeExists => -110,
            ErrorCode::NotEmpty => -111,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::NoNode => "NO_NODE",
            ErrorCode::BadVersion => "BAD_VERSION",
            ErrorCode::NoChildrenForEphemerals => "NO_CHILDREN_FOR_EPHEMERALS",
            ErrorCode::NodeExists => "NODE_EXISTS",
            ErrorCode::NotEmpty => "NOT_EMPTY",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.name(), self.code())
    }
}

/// A domain error: the tree was not in the state the operation required.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {path}")]
pub struct ZkError {
    code: ErrorCode,
    path: String,
}

impl ZkError {
    pub fn new<P: Into<String>>(code: ErrorCode, path: P) -> Self {
        Self {
            code,
            path: path.into(),
        }
    }

    pub fn no_node<P: Into<String>>(path: P) -> Self {
        Self::new(ErrorCode::NoNode, path)
    }

    pub fn node_exists<P: Into<String>>(path: P) -> Self {
        Self::new(ErrorCode::NodeExists, path)
    }

    pub fn not_empty<P: Into<String>>(path: P) -> Self {
        Self::new(ErrorCode::NotEmpty, path)
    }

    pub fn no_children_for_ephemerals<P: Into<String>>(path: P) -> Self {
        Self::new(ErrorCode::NoChildrenForEphemerals, path)
    }

    pub fn bad_version<P: Into<String>>(path: P) -> Self {
        Self::new(ErrorCode::BadVersion, path)
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The full path the operation was applied to, chroot included.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Caller misuse, reported synchronously and never through a completion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("Node path must be a non-empty string")]
    EmptyPath,

    #[error("Node path must start with / character: {0}")]
    NotAbsolute(String),

    #[error("Node path must not end with / character: {0}")]
    TrailingSlash(String),

    #[error("Node path must not contain empty node name: {0}")]
    EmptySegment(String),

    #[error("Node path must not contain relative path(s): {0}")]
    RelativeSegment(String),

    #[error("The root node cannot be removed")]
    RootNotRemovable,

    #[error("ACL list must not be empty")]
    EmptyAcl,

    #[error("Invalid chroot in connection string '{connection}': {reason}")]
    InvalidChroot {
        connection: String,
        reason: Box<ArgumentError>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Either tier of error, for callers that go through [`crate::ZkClient`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Argument(#[from] ArgumentError),

    #[error(transparent)]
    Zk(#[from] ZkError),
}

impl ClientError {
    /// The domain error code, if this is a domain error.
    pub fn zk_code(&self) -> Option<ErrorCode> {
        match self {
            ClientError::Zk(err) => Some(err.code()),
            ClientError::Argument(_) => None,
        }
    }
}
