//! Host byte-order detection for decoding kernel file handles
//!
//! The kernel encodes the cgroup ID into the file-handle payload in native
//! byte order (big-endian on mips/mips64/ppc64/s390x, little-endian
//! elsewhere). Detecting the order once lets the walker decode handle bytes
//! into a `u64` consistently on any architecture.

/// Byte order of the host CPU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

/// Determine the host byte order by inspecting the native-layout bytes of a
/// known multi-byte integer. Pure and infallible.
pub fn host_byte_order() -> ByteOrder {
    let probe: u16 = 0x00ff;
    if probe.to_ne_bytes()[0] == 0xff {
        ByteOrder::LittleEndian
    } else {
        ByteOrder::BigEndian
    }
}

/// Decode the first 8 bytes of a file-handle payload as a cgroup ID
///
/// Returns `None` if the payload carries fewer than 8 bytes.
pub fn decode_handle(bytes: &[u8], order: ByteOrder) -> Option<u64> {
    let raw: [u8; 8] = bytes.get(..8)?.try_into().ok()?;
    Some(match order {
        ByteOrder::LittleEndian => u64::from_le_bytes(raw),
        ByteOrder::BigEndian => u64::from_be_bytes(raw),
    })
}
