//! Versioned binary encoding of persisted records.
//!
//! Every record begins with the 8-byte little-endian
//! [`ProtocolVersion`] that wrote it. Fields follow in declaration
//! order:
//!
//! | Field           | Encoding                                          |
//! |-----------------|---------------------------------------------------|
//! | `i64`, `i32`    | little-endian                                     |
//! | bytes           | `u32` little-endian length, then the bytes        |
//! | optional bytes  | `u8` presence flag (`0` or `1`), then bytes       |
//!
//! Decoding must consume the whole value. Short input, trailing bytes
//! and unknown presence flags are reported as [`RECORD_DECODE`].
//!
//! [`RECORD_DECODE`]: crate::error::RECORD_DECODE

use bytes::{BufMut, Bytes, BytesMut};
use nom::IResult;

use std::convert::TryFrom;
use std::fmt;

use crate::error::{FdbError, FdbResult, RECORD_DECODE, RECORD_UNKNOWN_PROTOCOL_VERSION};

/// Protocol version stamped at the front of every persisted record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtocolVersion(u64);

impl ProtocolVersion {
    /// First version with tenants. Tenant entries hold an id and a
    /// stored prefix.
    pub const WITH_TENANTS: ProtocolVersion = ProtocolVersion(0x0FDB_00B0_7100_0000);

    /// Version that added tenant groups, tenant states, assigned
    /// clusters and data cluster records.
    pub const WITH_TENANT_GROUPS: ProtocolVersion = ProtocolVersion(0x0FDB_00B0_7200_0000);

    /// Version used for every record written by this crate.
    pub const CURRENT: ProtocolVersion = ProtocolVersion::WITH_TENANT_GROUPS;

    /// Returns the raw version number.
    pub fn version(self) -> u64 {
        self.0
    }

    /// Returns `true` if records written at this version carry
    /// tenant groups.
    pub fn has_tenant_groups(self) -> bool {
        self >= ProtocolVersion::WITH_TENANT_GROUPS
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Builds an encoded record.
#[derive(Debug)]
pub(crate) struct RecordWriter {
    buf: BytesMut,
}

impl RecordWriter {
    pub(crate) fn new(version: ProtocolVersion) -> RecordWriter {
        let mut buf = BytesMut::new();
        buf.put_u64_le(version.0);
        RecordWriter { buf }
    }

    pub(crate) fn put_i64(&mut self, v: i64) -> &mut RecordWriter {
        self.buf.put_i64_le(v);
        self
    }

    pub(crate) fn put_i32(&mut self, v: i32) -> &mut RecordWriter {
        self.buf.put_i32_le(v);
        self
    }

    pub(crate) fn put_bytes(&mut self, b: &[u8]) -> &mut RecordWriter {
        // Keys and values are far below 4 GiB.
        self.buf.put_u32_le(b.len() as u32);
        self.buf.put(b);
        self
    }

    pub(crate) fn put_optional_bytes(&mut self, b: Option<&[u8]>) -> &mut RecordWriter {
        match b {
            Some(b) => {
                self.buf.put_u8(1);
                self.put_bytes(b)
            }
            None => {
                self.buf.put_u8(0);
                self
            }
        }
    }

    pub(crate) fn finish(&mut self) -> Bytes {
        self.buf.split().freeze()
    }
}

/// Decode a record, dispatching the body to `body` together with the
/// protocol version found in the header.
///
/// Versions outside `[oldest, ProtocolVersion::CURRENT]` fail with
/// [`RECORD_UNKNOWN_PROTOCOL_VERSION`].
///
/// [`RECORD_UNKNOWN_PROTOCOL_VERSION`]: crate::error::RECORD_UNKNOWN_PROTOCOL_VERSION
pub(crate) fn decode_record<T, F>(value: &[u8], oldest: ProtocolVersion, body: F) -> FdbResult<T>
where
    F: FnOnce(ProtocolVersion, &[u8]) -> IResult<&[u8], T>,
{
    let (i, raw_version) = parser::version(value).map_err(|_| FdbError::new(RECORD_DECODE))?;
    let version = ProtocolVersion::try_from(raw_version)?;

    if version < oldest {
        return Err(FdbError::new(RECORD_UNKNOWN_PROTOCOL_VERSION));
    }

    match body(version, i) {
        Ok((rest, t)) if rest.is_empty() => Ok(t),
        _ => Err(FdbError::new(RECORD_DECODE)),
    }
}

pub(crate) mod parser {
    use bytes::Bytes;
    use nom::bytes::complete::take;
    use nom::error::{Error, ErrorKind};
    use nom::number::complete::{le_i32, le_i64, le_u32, le_u64, le_u8};
    use nom::IResult;

    use std::convert::TryFrom;

    pub(crate) fn fail(i: &[u8]) -> nom::Err<Error<&[u8]>> {
        nom::Err::Error(Error::new(i, ErrorKind::Fail))
    }

    pub(crate) fn version(i: &[u8]) -> IResult<&[u8], u64> {
        le_u64(i)
    }

    pub(crate) fn i64(i: &[u8]) -> IResult<&[u8], i64> {
        le_i64(i)
    }

    pub(crate) fn i32(i: &[u8]) -> IResult<&[u8], i32> {
        le_i32(i)
    }

    pub(crate) fn bytes(i: &[u8]) -> IResult<&[u8], Bytes> {
        let (i, len) = le_u32(i)?;
        let len = usize::try_from(len).map_err(|_| fail(i))?;
        let (i, b) = take(len)(i)?;
        Ok((i, Bytes::copy_from_slice(b)))
    }

    pub(crate) fn optional_bytes(i: &[u8]) -> IResult<&[u8], Option<Bytes>> {
        let (i1, flag) = le_u8(i)?;
        match flag {
            0 => Ok((i1, None)),
            1 => {
                let (i2, b) = bytes(i1)?;
                Ok((i2, Some(b)))
            }
            _ => Err(fail(i)),
        }
    }
}

impl TryFrom<u64> for ProtocolVersion {
    type Error = FdbError;

    fn try_from(v: u64) -> FdbResult<ProtocolVersion> {
        let version = ProtocolVersion(v);
        if version >= ProtocolVersion::WITH_TENANTS && version <= ProtocolVersion::CURRENT {
            Ok(version)
        } else {
            Err(FdbError::new(RECORD_UNKNOWN_PROTOCOL_VERSION))
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use std::convert::TryFrom;

    use crate::error::{FdbError, RECORD_DECODE, RECORD_UNKNOWN_PROTOCOL_VERSION};

    use super::{decode_record, parser, ProtocolVersion, RecordWriter};

    fn decode(value: &[u8]) -> Result<(i64, Option<Bytes>), FdbError> {
        decode_record(value, ProtocolVersion::WITH_TENANT_GROUPS, |_, i| {
            let (i, id) = parser::i64(i)?;
            let (i, group) = parser::optional_bytes(i)?;
            Ok((i, (id, group)))
        })
    }

    #[test]
    fn layout() {
        let value = RecordWriter::new(ProtocolVersion::CURRENT)
            .put_i64(1)
            .put_optional_bytes(Some(&b"g"[..]))
            .finish();

        assert_eq!(
            value,
            Bytes::from_static(
                &b"\x00\x00\x00\x72\xB0\x00\xDB\x0F\x01\x00\x00\x00\x00\x00\x00\x00\x01\x01\x00\x00\x00g"[..]
            )
        );
        assert_eq!(
            decode(&value[..]),
            Ok((1, Some(Bytes::from_static(&b"g"[..]))))
        );
    }

    #[test]
    fn rejects_malformed_records() {
        let value = RecordWriter::new(ProtocolVersion::CURRENT)
            .put_i64(1)
            .put_optional_bytes(None)
            .finish();

        // trailing bytes
        let mut trailing = value.to_vec();
        trailing.push(0);
        assert_eq!(decode(&trailing[..]), Err(FdbError::new(RECORD_DECODE)));

        // short input
        assert_eq!(
            decode(&value[..value.len() - 1]),
            Err(FdbError::new(RECORD_DECODE))
        );
        assert_eq!(decode(&value[..3]), Err(FdbError::new(RECORD_DECODE)));

        // bad presence flag
        let mut flag = value.to_vec();
        let last = flag.len() - 1;
        flag[last] = 2;
        assert_eq!(decode(&flag[..]), Err(FdbError::new(RECORD_DECODE)));

        // unknown version
        let value = RecordWriter::new(ProtocolVersion::WITH_TENANTS)
            .put_i64(1)
            .put_optional_bytes(None)
            .finish();
        assert_eq!(
            decode(&value[..]),
            Err(FdbError::new(RECORD_UNKNOWN_PROTOCOL_VERSION))
        );

        // version from the future
        let mut future = value.to_vec();
        future[..8].copy_from_slice(&0x0FDB_00B0_7300_0000u64.to_le_bytes());
        assert_eq!(
            decode(&future[..]),
            Err(FdbError::new(RECORD_UNKNOWN_PROTOCOL_VERSION))
        );
    }

    #[test]
    fn protocol_version() {
        assert!(ProtocolVersion::CURRENT.has_tenant_groups());
        assert!(!ProtocolVersion::WITH_TENANTS.has_tenant_groups());
        assert_eq!(
            ProtocolVersion::try_from(0x0FDB_00B0_7200_0000),
            Ok(ProtocolVersion::WITH_TENANT_GROUPS)
        );
        assert_eq!(
            ProtocolVersion::try_from(0x0FDB_00B0_7300_0000),
            Err(FdbError::new(RECORD_UNKNOWN_PROTOCOL_VERSION))
        );
        assert_eq!(
            ProtocolVersion::CURRENT.to_string(),
            "0x0fdb00b072000000"
        );
    }
}
