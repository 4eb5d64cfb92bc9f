use super::{Error, Payload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum WriteOp {
    Insert,
    Update,
    Delete,
}

/// A write that the server rejected with something other than the expected
/// 201/200/204.
#[derive(Debug)]
pub(super) struct WriteError {
    pub(super) op: WriteOp,
    pub(super) status: u16,
    pub(super) payload: Payload,
}

impl std::error::Error for WriteError {}

impl core::fmt::Display for WriteError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let op = match self.op {
            WriteOp::Insert => "insert",
            WriteOp::Update => "update",
            WriteOp::Delete => "delete",
        };
        write!(
            f,
            "{op} failed (status {}): {}",
            self.status, self.payload
        )
    }
}

impl Error {
    pub fn insert(status: u16, payload: impl Into<Payload>) -> Error {
        Error::write(WriteOp::Insert, status, payload.into())
    }

    pub fn update(status: u16, payload: impl Into<Payload>) -> Error {
        Error::write(WriteOp::Update, status, payload.into())
    }

    pub fn delete(status: u16, payload: impl Into<Payload>) -> Error {
        Error::write(WriteOp::Delete, status, payload.into())
    }

    fn write(op: WriteOp, status: u16, payload: Payload) -> Error {
        Error::from(super::ErrorKind::Write(WriteError {
            op,
            status,
            payload,
        }))
    }

    pub fn is_insert(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::Write(err) if err.op == WriteOp::Insert)
    }

    pub fn is_update(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::Write(err) if err.op == WriteOp::Update)
    }

    pub fn is_delete(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::Write(err) if err.op == WriteOp::Delete)
    }
}
