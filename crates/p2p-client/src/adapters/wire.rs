//! Binary payload layout of the typed messages.
//!
//! Integers are little-endian. Strings are a varuint32 byte length followed
//! by UTF-8. Checksums are 32 raw bytes. Keys and signatures are a curve tag
//! followed by the raw key bytes. The handshake time is `i64` nanoseconds
//! since the Unix epoch.

use chrono::{TimeZone, Utc};

use crate::domain::{
    Checksum256, CodecError, GoAwayMessage, HandshakeMessage, MessageType, P2PMessage, PublicKey,
    Signature, SyncRequestMessage, TimeMessage, CURVE_K1, PUBLIC_KEY_LEN, SIGNATURE_LEN,
};

fn malformed(reason: impl Into<String>) -> CodecError {
    CodecError::Malformed(reason.into())
}

/// Payload bytes of `message`.
pub(crate) fn encode_message(message: &P2PMessage) -> Result<Vec<u8>, CodecError> {
    let mut w = PayloadWriter::default();
    match message {
        P2PMessage::Handshake(m) => w.handshake(m)?,
        P2PMessage::GoAway(m) => {
            w.u8(m.reason);
            w.bytes(&m.node_id);
        }
        P2PMessage::Time(m) => {
            for ts in [m.org, m.rec, m.xmt, m.dst] {
                w.i64(ts);
            }
        }
        P2PMessage::SyncRequest(m) => {
            w.u32(m.start_block);
            w.u32(m.end_block);
        }
        P2PMessage::Opaque { payload, .. } => w.bytes(payload),
    }
    Ok(w.buf)
}

/// Message of type `kind` from its payload bytes.
pub(crate) fn decode_message(kind: MessageType, payload: Vec<u8>) -> Result<P2PMessage, CodecError> {
    let mut r = PayloadReader::new(&payload);
    let message = match kind {
        MessageType::Handshake => P2PMessage::Handshake(r.handshake()?),
        MessageType::GoAway => P2PMessage::GoAway(GoAwayMessage {
            reason: r.u8()?,
            node_id: r.checksum()?,
        }),
        MessageType::Time => P2PMessage::Time(TimeMessage {
            org: r.i64()?,
            rec: r.i64()?,
            xmt: r.i64()?,
            dst: r.i64()?,
        }),
        MessageType::SyncRequest => P2PMessage::SyncRequest(SyncRequestMessage {
            start_block: r.u32()?,
            end_block: r.u32()?,
        }),
        _ => return Ok(P2PMessage::Opaque { kind, payload }),
    };
    r.finish(kind)?;
    Ok(message)
}

#[derive(Default)]
struct PayloadWriter {
    buf: Vec<u8>,
}

impl PayloadWriter {
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i64(&mut self, v: i64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn varuint32(&mut self, mut v: u32) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    fn string(&mut self, v: &str) -> Result<(), CodecError> {
        let len = u32::try_from(v.len()).map_err(|_| malformed("string longer than u32::MAX"))?;
        self.varuint32(len);
        self.bytes(v.as_bytes());
        Ok(())
    }

    fn handshake(&mut self, m: &HandshakeMessage) -> Result<(), CodecError> {
        let time = m
            .time
            .timestamp_nanos_opt()
            .ok_or_else(|| malformed(format!("handshake time {} out of range", m.time)))?;

        self.u16(m.network_version);
        self.bytes(&m.chain_id);
        self.bytes(&m.node_id);
        self.u8(CURVE_K1);
        self.bytes(m.key.as_bytes());
        self.i64(time);
        self.bytes(&m.token);
        self.u8(CURVE_K1);
        self.bytes(m.sig.as_bytes());
        self.string(&m.p2p_address)?;
        self.u32(m.last_irreversible_block_num);
        self.bytes(&m.last_irreversible_block_id);
        self.u32(m.head_num);
        self.bytes(&m.head_id);
        self.string(&m.os)?;
        self.string(&m.agent)?;
        self.i16(m.generation);
        Ok(())
    }
}

struct PayloadReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| {
                malformed(format!(
                    "payload ends at {} bytes, needed {} more at offset {}",
                    self.buf.len(),
                    n,
                    self.pos
                ))
            })?;
        let buf = self.buf;
        let slice = &buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn i16(&mut self) -> Result<i16, CodecError> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64, CodecError> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn varuint32(&mut self) -> Result<u32, CodecError> {
        let mut value: u32 = 0;
        for shift in (0..35).step_by(7) {
            let byte = self.u8()?;
            let bits = u32::from(byte & 0x7f);
            if shift == 28 && bits > 0x0f {
                return Err(malformed("varuint32 overflow"));
            }
            value |= bits << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(malformed("varuint32 longer than 5 bytes"))
    }

    fn string(&mut self) -> Result<String, CodecError> {
        let len = self.varuint32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| malformed(format!("invalid UTF-8 string: {e}")))
    }

    fn checksum(&mut self) -> Result<Checksum256, CodecError> {
        self.array()
    }

    fn curve(&mut self) -> Result<(), CodecError> {
        match self.u8()? {
            CURVE_K1 => Ok(()),
            other => Err(malformed(format!("unsupported key curve {other}"))),
        }
    }

    fn public_key(&mut self) -> Result<PublicKey, CodecError> {
        self.curve()?;
        Ok(PublicKey::from_bytes(self.array::<PUBLIC_KEY_LEN>()?))
    }

    fn signature(&mut self) -> Result<Signature, CodecError> {
        self.curve()?;
        Ok(Signature::from_bytes(self.array::<SIGNATURE_LEN>()?))
    }

    fn handshake(&mut self) -> Result<HandshakeMessage, CodecError> {
        Ok(HandshakeMessage {
            network_version: self.u16()?,
            chain_id: self.checksum()?,
            node_id: self.checksum()?,
            key: self.public_key()?,
            time: Utc.timestamp_nanos(self.i64()?),
            token: self.checksum()?,
            sig: self.signature()?,
            p2p_address: self.string()?,
            last_irreversible_block_num: self.u32()?,
            last_irreversible_block_id: self.checksum()?,
            head_num: self.u32()?,
            head_id: self.checksum()?,
            os: self.string()?,
            agent: self.string()?,
            generation: self.i16()?,
        })
    }

    fn finish(&self, kind: MessageType) -> Result<(), CodecError> {
        match self.buf.len() - self.pos {
            0 => Ok(()),
            extra => Err(malformed(format!("{extra} trailing bytes after {kind}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClientIdentity, HandshakeBuilder, HandshakeInfo};

    fn make_handshake() -> HandshakeMessage {
        let builder = HandshakeBuilder::new(ClientIdentity::new("peer:9876", [7u8; 32], 1206));
        let info = HandshakeInfo {
            head_block_num: 100,
            head_block_id: [1u8; 32],
            head_block_time: Utc.with_ymd_and_hms(2024, 3, 3, 3, 3, 3).unwrap(),
            last_irreversible_block_num: 90,
            last_irreversible_block_id: [2u8; 32],
        };
        builder.build(&info).unwrap()
    }

    #[test]
    fn test_sync_request_layout() {
        let payload = encode_message(&P2PMessage::SyncRequest(SyncRequestMessage {
            start_block: 90,
            end_block: 0x0102_0304,
        }))
        .unwrap();
        assert_eq!(payload, vec![90, 0, 0, 0, 0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_handshake_layout() {
        let msg = make_handshake();
        let payload = encode_message(&P2PMessage::Handshake(msg.clone())).unwrap();

        // version, chain id, node id
        assert_eq!(&payload[..2], &1206u16.to_le_bytes());
        assert_eq!(&payload[2..34], &[7u8; 32]);
        // key: curve tag + 33 zero bytes
        assert_eq!(payload[66], CURVE_K1);
        assert_eq!(&payload[67..100], &[0u8; 33]);
        // time in nanoseconds
        let nanos = msg.time.timestamp_nanos_opt().unwrap();
        assert_eq!(&payload[100..108], &nanos.to_le_bytes());
        // token, then signature: curve tag + 65 zero bytes
        assert_eq!(payload[140], CURVE_K1);
        // p2p address: length byte then text
        assert_eq!(payload[206], 9);
        assert_eq!(&payload[207..216], b"peer:9876");
        // generation closes the payload
        assert_eq!(&payload[payload.len() - 2..], &1i16.to_le_bytes());
        assert_eq!(payload.len(), 313);

        let decoded = decode_message(MessageType::Handshake, payload).unwrap();
        assert_eq!(decoded, P2PMessage::Handshake(msg));
    }

    #[test]
    fn test_decoded_key_material_renders_checked_text() {
        let payload = encode_message(&P2PMessage::Handshake(make_handshake())).unwrap();
        let P2PMessage::Handshake(decoded) = decode_message(MessageType::Handshake, payload).unwrap() else {
            panic!("expected a handshake");
        };
        assert_eq!(decoded.key.as_str(), crate::domain::NULL_PUBLIC_KEY);
        assert!(decoded.sig.as_str().starts_with("SIG_K1_"));
        assert_eq!(decoded.sig, Signature::null().unwrap());
    }

    #[test]
    fn test_varuint32_lengths() {
        let mut w = PayloadWriter::default();
        w.varuint32(300);
        w.varuint32(u32::MAX);
        assert_eq!(w.buf, vec![0xac, 0x02, 0xff, 0xff, 0xff, 0xff, 0x0f]);

        let mut r = PayloadReader::new(&w.buf);
        assert_eq!(r.varuint32().unwrap(), 300);
        assert_eq!(r.varuint32().unwrap(), u32::MAX);

        let mut r = PayloadReader::new(&[0xff, 0xff, 0xff, 0xff, 0x1f]);
        assert!(matches!(r.varuint32(), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut payload = encode_message(&P2PMessage::GoAway(GoAwayMessage {
            reason: 3,
            node_id: [9u8; 32],
        }))
        .unwrap();
        assert_eq!(payload.len(), 33);
        payload.push(0);

        assert!(matches!(
            decode_message(MessageType::GoAway, payload),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn test_unknown_curve_rejected() {
        let mut payload = encode_message(&P2PMessage::Handshake(make_handshake())).unwrap();
        payload[66] = 1;
        assert!(matches!(
            decode_message(MessageType::Handshake, payload),
            Err(CodecError::Malformed(_))
        ));
    }

    #[test]
    fn test_opaque_kinds_pass_through() {
        let decoded = decode_message(MessageType::Notice, vec![1, 2, 3]).unwrap();
        assert_eq!(
            decoded,
            P2PMessage::Opaque {
                kind: MessageType::Notice,
                payload: vec![1, 2, 3]
            }
        );
    }
}
