//! Binary frame parsing (panic-free).
//!
//! Layout: `v:u8 | op:u8 | flags:u8 | [seq:u32 LE] | group_len:u8 | group | payload`
//!
//! Parsing rules:
//! - Never index (`buf[0]`); always use `Buf` with `remaining()` checks.
//! - Never `unwrap()` / `expect()` / `panic!()` in production paths.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{HubError, Result};

/// Flag: seq (u32) is present.
pub const FLAG_SEQ_PRESENT: u8 = 0x01;
/// Flag: do not deliver a broadcast back to its sender.
pub const FLAG_EXCLUDE_SELF: u8 = 0x02;

/// Binary operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// Relay payload to every member of `group`.
    Broadcast,
    /// Return payload to the sending connection.
    Echo,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Broadcast => "broadcast",
            BinaryOp::Echo => "echo",
        }
    }

    pub fn code(self) -> u8 {
        match self {
            BinaryOp::Broadcast => 1,
            BinaryOp::Echo => 2,
        }
    }

    fn from_code(op: u8) -> Result<Self> {
        match op {
            1 => Ok(BinaryOp::Broadcast),
            2 => Ok(BinaryOp::Echo),
            other => Err(HubError::BadRequest(format!("unknown binary op: {other}"))),
        }
    }
}

/// Parsed binary frame.
#[derive(Debug, Clone)]
pub struct BinaryFrame {
    pub v: u8,
    pub op: BinaryOp,
    pub flags: u8,
    pub seq: Option<u32>,
    /// Empty for `Echo`.
    pub group: String,
    /// Opaque payload (zero-copy slice of the input).
    pub payload: Bytes,
}

impl BinaryFrame {
    pub fn exclude_self(&self) -> bool {
        self.flags & FLAG_EXCLUDE_SELF != 0
    }
}

/// Decode a binary frame.
pub fn decode_binary_frame(mut buf: Bytes) -> Result<BinaryFrame> {
    // v, op, flags
    if buf.remaining() < 3 {
        return Err(HubError::BadRequest("binary frame too short".into()));
    }

    let v = buf.get_u8();
    if v != super::PROTOCOL_VERSION {
        return Err(HubError::UnsupportedVersion);
    }

    let op = BinaryOp::from_code(buf.get_u8())?;
    let flags = buf.get_u8();

    let seq = if flags & FLAG_SEQ_PRESENT != 0 {
        if buf.remaining() < 4 {
            return Err(HubError::BadRequest("seq flag set but missing u32".into()));
        }
        Some(buf.get_u32_le())
    } else {
        None
    };

    if buf.remaining() < 1 {
        return Err(HubError::BadRequest("missing group length".into()));
    }
    let group_len = usize::from(buf.get_u8());
    if buf.remaining() < group_len {
        return Err(HubError::BadRequest("group length exceeds frame".into()));
    }
    let group_bytes = buf.copy_to_bytes(group_len);
    let group = std::str::from_utf8(&group_bytes)
        .map_err(|e| HubError::BadRequest(format!("group is not utf8: {e}")))?
        .to_owned();

    if op == BinaryOp::Broadcast {
        super::validate_group_name(&group)?;
    }

    let payload = buf.copy_to_bytes(buf.remaining());

    Ok(BinaryFrame {
        v,
        op,
        flags,
        seq,
        group,
        payload,
    })
}

/// Encode a binary frame (used by clients and tests).
pub fn encode_binary_frame(
    op: BinaryOp,
    flags: u8,
    seq: Option<u32>,
    group: &str,
    payload: &[u8],
) -> Result<Bytes> {
    let group_len = u8::try_from(group.len())
        .map_err(|_| HubError::BadRequest("group name too long for binary frame".into()))?;
    let flags = match seq {
        Some(_) => flags | FLAG_SEQ_PRESENT,
        None => flags & !FLAG_SEQ_PRESENT,
    };

    let mut out = BytesMut::with_capacity(8 + group.len() + payload.len());
    out.put_u8(super::PROTOCOL_VERSION);
    out.put_u8(op.code());
    out.put_u8(flags);
    if let Some(seq) = seq {
        out.put_u32_le(seq);
    }
    out.put_u8(group_len);
    out.put_slice(group.as_bytes());
    out.put_slice(payload);
    Ok(out.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_keeps_header() {
        let b = encode_binary_frame(BinaryOp::Broadcast, FLAG_EXCLUDE_SELF, Some(9), "room1", b"xyz")
            .unwrap();
        let f = decode_binary_frame(b).unwrap();
        assert_eq!(f.op, BinaryOp::Broadcast);
        assert_eq!(f.seq, Some(9));
        assert!(f.exclude_self());
        assert_eq!(f.group, "room1");
        assert_eq!(&f.payload[..], b"xyz");
    }

    #[test]
    fn truncated_group_is_rejected() {
        // v=1 op=1 flags=0 group_len=10 "ab"
        let b = Bytes::from_static(&[1, 1, 0, 10, b'a', b'b']);
        let e = decode_binary_frame(b).unwrap_err();
        assert_eq!(e.client_code().as_str(), "BAD_REQUEST");
    }
}
