use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::borrow::Cow;
use std::fmt::{Debug, Display, Formatter};

/// Largest payload a single IPv4 UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

const HEADER_LEN: usize = 5;

pub type Sequence = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    Handshake = 0,
    Disconnect = 1,
    Read = 2,
    Insert = 3,
    Update = 4,
    Delete = 5,
    Monitor = 6,
}

impl Display for OpCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

impl TryFrom<u8> for OpCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => OpCode::Handshake,
            1 => OpCode::Disconnect,
            2 => OpCode::Read,
            3 => OpCode::Insert,
            4 => OpCode::Update,
            5 => OpCode::Delete,
            6 => OpCode::Monitor,
            other => return Err(ProtocolError::UnknownOperation(other)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Handshake { session_id: u32 },
    Disconnect,
    Read { path: String, offset: u32, amount: u32 },
    Insert { path: String, offset: u32, data: Bytes },
    Update { path: String, offset: u32, data: Bytes },
    Delete { path: String, offset: u32, amount: u32 },
    Monitor { path: String, interval_ms: u32 },
}

impl Operation {
    pub fn op_code(&self) -> OpCode {
        match self {
            Operation::Handshake { .. } => OpCode::Handshake,
            Operation::Disconnect => OpCode::Disconnect,
            Operation::Read { .. } => OpCode::Read,
            Operation::Insert { .. } => OpCode::Insert,
            Operation::Update { .. } => OpCode::Update,
            Operation::Delete { .. } => OpCode::Delete,
            Operation::Monitor { .. } => OpCode::Monitor,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            Operation::Handshake { .. } | Operation::Disconnect => None,
            Operation::Read { path, .. }
            | Operation::Insert { path, .. }
            | Operation::Update { path, .. }
            | Operation::Delete { path, .. }
            | Operation::Monitor { path, .. } => Some(path),
        }
    }
}

/// A numbered request. The sequence number is fixed at construction, so
/// every retransmission of the encoded bytes carries the same number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub sequence: Sequence,
    pub operation: Operation,
}

impl Request {
    pub fn new(sequence: Sequence, operation: Operation) -> Self {
        Self {
            sequence,
            operation,
        }
    }

    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + 16);
        buf.put_u32(self.sequence);
        buf.put_u8(self.operation.op_code() as u8);

        match &self.operation {
            Operation::Handshake { session_id } => buf.put_u32(*session_id),
            Operation::Disconnect => {}
            Operation::Read {
                path,
                offset,
                amount,
            }
            | Operation::Delete {
                path,
                offset,
                amount,
            } => {
                put_field(&mut buf, path.as_bytes())?;
                buf.put_u32(*offset);
                buf.put_u32(*amount);
            }
            Operation::Insert { path, offset, data } | Operation::Update { path, offset, data } => {
                put_field(&mut buf, path.as_bytes())?;
                buf.put_u32(*offset);
                put_field(&mut buf, data)?;
            }
            Operation::Monitor { path, interval_ms } => {
                put_field(&mut buf, path.as_bytes())?;
                buf.put_u32(*interval_ms);
            }
        }

        if buf.len() > MAX_DATAGRAM_SIZE {
            return Err(ProtocolError::DatagramTooLarge {
                len: buf.len(),
                max: MAX_DATAGRAM_SIZE,
            });
        }
        Ok(buf.freeze())
    }

    /// Server-side view of a datagram. Every field must be present and
    /// nothing may follow the last one.
    pub fn decode(mut raw: &[u8]) -> Result<Self, ProtocolError> {
        let buf = &mut raw;
        let sequence = take_u32(buf)?;
        let operation = match OpCode::try_from(take_u8(buf)?)? {
            OpCode::Handshake => Operation::Handshake {
                session_id: take_u32(buf)?,
            },
            OpCode::Disconnect => Operation::Disconnect,
            OpCode::Read => Operation::Read {
                path: take_path(buf)?,
                offset: take_u32(buf)?,
                amount: take_u32(buf)?,
            },
            OpCode::Delete => Operation::Delete {
                path: take_path(buf)?,
                offset: take_u32(buf)?,
                amount: take_u32(buf)?,
            },
            OpCode::Insert => Operation::Insert {
                path: take_path(buf)?,
                offset: take_u32(buf)?,
                data: take_field(buf)?,
            },
            OpCode::Update => Operation::Update {
                path: take_path(buf)?,
                offset: take_u32(buf)?,
                data: take_field(buf)?,
            },
            OpCode::Monitor => Operation::Monitor {
                path: take_path(buf)?,
                interval_ms: take_u32(buf)?,
            },
        };

        if buf.has_remaining() {
            return Err(ProtocolError::TrailingBytes(buf.remaining()));
        }
        Ok(Self {
            sequence,
            operation,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Status {
    Bad = 0,
    Good = 1,
}

impl TryFrom<u8> for Status {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Status::Bad),
            1 => Ok(Status::Good),
            other => Err(ProtocolError::UnknownStatus(other)),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub payload: Bytes,
}

impl Response {
    pub fn new(status: Status, payload: impl Into<Bytes>) -> Self {
        Self {
            status,
            payload: payload.into(),
        }
    }

    /// `raw` must be exactly the bytes of one received datagram, not the
    /// whole receive buffer.
    pub fn decode(raw: &[u8]) -> Result<Self, ProtocolError> {
        let (&status, payload) = raw.split_first().ok_or(ProtocolError::Truncated {
            needed: 1,
            remaining: 0,
        })?;
        Ok(Self {
            status: Status::try_from(status)?,
            payload: Bytes::copy_from_slice(payload),
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + self.payload.len());
        buf.put_u8(self.status as u8);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    pub fn is_good(&self) -> bool {
        self.status == Status::Good
    }

    pub fn payload_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

impl Debug for Response {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "Response{{ status: {:?}, payloadSize: {} }}",
            self.status,
            self.payload.len()
        ))
    }
}

fn put_field(buf: &mut BytesMut, value: &[u8]) -> Result<(), ProtocolError> {
    let len = u32::try_from(value.len()).map_err(|_| ProtocolError::FieldTooLong(value.len()))?;
    buf.put_u32(len);
    buf.put_slice(value);
    Ok(())
}

fn ensure(buf: &&[u8], needed: usize) -> Result<(), ProtocolError> {
    if buf.remaining() < needed {
        return Err(ProtocolError::Truncated {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

fn take_u8(buf: &mut &[u8]) -> Result<u8, ProtocolError> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

fn take_u32(buf: &mut &[u8]) -> Result<u32, ProtocolError> {
    ensure(buf, 4)?;
    Ok(buf.get_u32())
}

fn take_field(buf: &mut &[u8]) -> Result<Bytes, ProtocolError> {
    let len = take_u32(buf)? as usize;
    ensure(buf, len)?;
    Ok(buf.copy_to_bytes(len))
}

fn take_path(buf: &mut &[u8]) -> Result<String, ProtocolError> {
    String::from_utf8(take_field(buf)?.to_vec()).map_err(|_| ProtocolError::InvalidPath)
}
