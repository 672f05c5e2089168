//! Wire protocol: one message per UDP datagram, a 4-bit tag followed by
//! tag-specific fields in the bit-level codec below.
//!
//! This is an out-of-scope external collaborator per the core design —
//! specified only where the core touches it (tags 0–3, the 256-bit hash
//! fields, the continue-bit-terminated slice list inside a block body).

pub mod bits;

use bits::{BitReader, BitWriter};
use primitive_types::U256;
use thiserror::Error;

use crate::core::types::{Block, BlockTime, Body, Hash, Slice};

/// Max bits a single slice may declare; covers the whole body budget many
/// times over, just enough to keep a corrupt length field from causing an
/// enormous allocation attempt.
const MAX_SLICE_BITS: u64 = 1 << 20;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("datagram ended before the declared fields were fully read")]
    UnexpectedEof,
    #[error("unknown message tag {0}")]
    UnknownTag(u8),
    #[error("declared slice length {0} bits exceeds the sanity limit")]
    SliceTooLong(u64),
}

/// One IPv4 or IPv6 peer address, as gossiped via `PutPeers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddress {
    pub ip_family: u8, // 4 or 6
    pub ip_bytes: Vec<u8>,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    PutPeers(Vec<PeerAddress>),
    PutBlock(Block),
    AskBlock(Hash),
    PutSlice(Slice),
}

impl Message {
    fn tag(&self) -> u8 {
        match self {
            Message::PutPeers(_) => 0,
            Message::PutBlock(_) => 1,
            Message::AskBlock(_) => 2,
            Message::PutSlice(_) => 3,
        }
    }
}

pub fn encode_message(msg: &Message) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.write_bits_msb(msg.tag() as u64, 4);
    match msg {
        Message::PutPeers(addrs) => encode_peer_list(&mut w, addrs),
        Message::PutBlock(block) => encode_block(&mut w, block),
        Message::AskBlock(hash) => w.write_bytes(hash),
        Message::PutSlice(slice) => encode_slice(&mut w, slice),
    }
    w.finish()
}

pub fn decode_message(data: &[u8]) -> Result<Message, CodecError> {
    let mut r = BitReader::new(data);
    let tag = r.read_bits_msb(4).ok_or(CodecError::UnexpectedEof)? as u8;
    match tag {
        0 => Ok(Message::PutPeers(decode_peer_list(&mut r)?)),
        1 => Ok(Message::PutBlock(decode_block(&mut r)?)),
        2 => {
            let bytes = r.read_bytes(32).ok_or(CodecError::UnexpectedEof)?;
            let mut hash = [0u8; 32];
            hash.copy_from_slice(&bytes);
            Ok(Message::AskBlock(hash))
        }
        3 => Ok(Message::PutSlice(decode_slice(&mut r)?)),
        other => Err(CodecError::UnknownTag(other)),
    }
}

fn encode_peer_list(w: &mut BitWriter, addrs: &[PeerAddress]) {
    w.write_bits_msb(addrs.len() as u64, 16);
    for addr in addrs {
        w.write_bits_msb(addr.ip_family as u64, 8);
        w.write_bytes(&addr.ip_bytes);
        w.write_bits_msb(addr.port as u64, 16);
    }
}

fn decode_peer_list(r: &mut BitReader) -> Result<Vec<PeerAddress>, CodecError> {
    let count = r.read_bits_msb(16).ok_or(CodecError::UnexpectedEof)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let ip_family = r.read_bits_msb(8).ok_or(CodecError::UnexpectedEof)? as u8;
        let ip_len = if ip_family == 6 { 16 } else { 4 };
        let ip_bytes = r.read_bytes(ip_len).ok_or(CodecError::UnexpectedEof)?;
        let port = r.read_bits_msb(16).ok_or(CodecError::UnexpectedEof)? as u16;
        out.push(PeerAddress { ip_family, ip_bytes, port });
    }
    Ok(out)
}

fn encode_slice(w: &mut BitWriter, slice: &Slice) {
    w.write_bits_msb(slice.bit_len as u64, 24);
    write_slice_bits(w, slice);
}

fn write_slice_bits(w: &mut BitWriter, slice: &Slice) {
    let full_bytes = slice.bit_len / 8;
    let trailing_bits = slice.bit_len % 8;
    w.write_bytes(&slice.bits[..full_bytes]);
    if trailing_bits > 0 {
        let last = slice.bits[full_bytes];
        w.write_bits_msb((last >> (8 - trailing_bits)) as u64, trailing_bits);
    }
}

fn decode_slice(r: &mut BitReader) -> Result<Slice, CodecError> {
    let bit_len = r.read_bits_msb(24).ok_or(CodecError::UnexpectedEof)?;
    if bit_len > MAX_SLICE_BITS {
        return Err(CodecError::SliceTooLong(bit_len));
    }
    let full_bytes = (bit_len / 8) as usize;
    let trailing_bits = (bit_len % 8) as usize;
    let mut bits = r.read_bytes(full_bytes).ok_or(CodecError::UnexpectedEof)?;
    if trailing_bits > 0 {
        let tail = r.read_bits_msb(trailing_bits).ok_or(CodecError::UnexpectedEof)? as u8;
        bits.push(tail << (8 - trailing_bits));
    }
    Ok(Slice::new(bits, bit_len as usize))
}

/// Serializes just the block bits (no message tag) — the form persisted
/// to `blocks/<16-hex-index>` on disk.
pub fn encode_block_bits(b: &Block) -> Vec<u8> {
    let mut w = BitWriter::new();
    encode_block(&mut w, b);
    w.finish()
}

/// Inverse of [`encode_block_bits`].
pub fn decode_block_bits(data: &[u8]) -> Result<Block, CodecError> {
    let mut r = BitReader::new(data);
    decode_block(&mut r)
}

/// `prev` (256 bits) ‖ `time` (256 bits) ‖ body (list of slices; each
/// slice preceded by a continue-bit, terminated by a zero bit).
fn encode_block(w: &mut BitWriter, b: &Block) {
    w.write_bytes(&b.prev);
    let mut time_bytes = [0u8; 32];
    b.time.numeric().to_big_endian(&mut time_bytes);
    w.write_bytes(&time_bytes);
    for slice in &b.body {
        w.write_bit(true);
        encode_slice(w, slice);
    }
    w.write_bit(false);
}

fn decode_block(r: &mut BitReader) -> Result<Block, CodecError> {
    let prev_bytes = r.read_bytes(32).ok_or(CodecError::UnexpectedEof)?;
    let mut prev = [0u8; 32];
    prev.copy_from_slice(&prev_bytes);

    // The raw 256-bit field already packs millis||nonce together;
    // `BlockTime::new` re-derives both halves from the numeric value.
    let time_bytes = r.read_bytes(32).ok_or(CodecError::UnexpectedEof)?;
    let numeric = U256::from_big_endian(&time_bytes);
    let time = BlockTime::new((numeric >> 192).low_u64(), numeric);

    let mut body: Body = Vec::new();
    loop {
        let cont = r.read_bit().ok_or(CodecError::UnexpectedEof)?;
        if !cont {
            break;
        }
        body.push(decode_slice(r)?);
    }

    Ok(Block { prev, time, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_block_round_trips() {
        let msg = Message::AskBlock([7u8; 32]);
        let bytes = encode_message(&msg);
        assert_eq!(decode_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn put_slice_round_trips_unaligned_bit_lengths() {
        let slice = Slice::new(vec![0b1010_0000], 4);
        let msg = Message::PutSlice(slice);
        let bytes = encode_message(&msg);
        assert_eq!(decode_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn put_block_round_trips_with_body() {
        let block = Block {
            prev: [3u8; 32],
            time: BlockTime::new(1_700_000_000_000, U256::from(42u64)),
            body: vec![Slice::new(vec![0xFF, 0x0F], 12), Slice::new(vec![0b1100_0000], 2)],
        };
        let msg = Message::PutBlock(block);
        let bytes = encode_message(&msg);
        assert_eq!(decode_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn put_peers_round_trips_mixed_families() {
        let msg = Message::PutPeers(vec![
            PeerAddress { ip_family: 4, ip_bytes: vec![127, 0, 0, 1], port: 42000 },
            PeerAddress { ip_family: 6, ip_bytes: vec![0u8; 16], port: 42001 },
        ]);
        let bytes = encode_message(&msg);
        assert_eq!(decode_message(&bytes).unwrap(), msg);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        // Tag 4 doesn't exist; top 4 bits = 0b0100.
        let bytes = vec![0b0100_0000];
        assert!(matches!(decode_message(&bytes), Err(CodecError::UnknownTag(4))));
    }

    #[test]
    fn truncated_datagram_is_rejected_not_panicked() {
        let bytes = vec![0b0010_0000]; // AskBlock tag, but no hash follows
        assert!(matches!(decode_message(&bytes), Err(CodecError::UnexpectedEof)));
    }
}
