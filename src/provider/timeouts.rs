//! Per-kind operation timeouts.

use std::fmt;
use std::time::Duration;

const fn minutes(n: u64) -> Duration {
    Duration::from_secs(n * 60)
}

/// A resource lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Create.
    Create,
    /// Read (refresh).
    Read,
    /// Update in place.
    Update,
    /// Delete.
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Upper bounds for each operation of a resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Create.
    pub create: Duration,
    /// Read.
    pub read: Duration,
    /// Update.
    pub update: Duration,
    /// Delete.
    pub delete: Duration,
}

impl Timeouts {
    /// Defaults for resources without long-running operations.
    pub const DEFAULT: Self = Self {
        create: minutes(5),
        read: minutes(2),
        update: minutes(5),
        delete: minutes(5),
    };

    /// Instance disks.
    pub const INSTANCE_DISK: Self = Self {
        create: minutes(15),
        read: minutes(2),
        update: minutes(20),
        delete: minutes(10),
    };

    /// LKE clusters.
    pub const LKE_CLUSTER: Self = Self {
        create: minutes(35),
        read: minutes(2),
        update: minutes(40),
        delete: minutes(15),
    };

    /// Timeout of `operation`.
    #[must_use]
    pub const fn for_operation(&self, operation: Operation) -> Duration {
        match operation {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::DEFAULT
    }
}
