use bytes::{Bytes, BytesMut};

use crate::error::{FdbError, FdbResult, TUPLE_FROM_BYTES};
use crate::tuple::Tuple;

// Typecodes follow the FoundationDB tuple layer.
// https://github.com/apple/foundationdb/blob/main/design/tuple.md
#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) enum TupleValue {
    ByteString(Bytes),     // 0x01
    UnicodeString(String), // 0x02
    Integer(i64),          // 0x0c - 0x1c
}

const BYTE_STRING: u8 = 0x01;
const UNICODE_STRING: u8 = 0x02;
const NEG_INT_8: u8 = 0x0C;
const INT_ZERO: u8 = 0x14;
const POS_INT_8: u8 = 0x1C;

pub(crate) fn from_bytes(b: Bytes) -> FdbResult<Tuple> {
    parser::tuple(b.as_ref())
        .map(|(_, t)| t)
        .map_err(|_| FdbError::new(TUPLE_FROM_BYTES))
}

pub(crate) fn to_bytes(t: &Tuple) -> Bytes {
    let mut res = BytesMut::new();

    t.elements().iter().for_each(|x| {
        match x {
            TupleValue::ByteString(b) => serializer::byte_string(&mut res, b),
            TupleValue::UnicodeString(s) => serializer::unicode_string(&mut res, s),
            TupleValue::Integer(i) => serializer::integer(&mut res, *i),
        };
    });

    res.into()
}

pub(self) mod serializer {
    use bytes::{BufMut, BytesMut};

    use super::{BYTE_STRING, INT_ZERO, UNICODE_STRING};

    // Both `byte_string` and `unicode_string` uses the same packing
    // format. Embedded `\x00` is escaped as `\x00\xFF`.
    fn escaped(res: &mut BytesMut, typecode: u8, b: &[u8]) {
        res.put_u8(typecode);

        b.iter().for_each(|x| {
            if *x == b'\x00' {
                res.put(&b"\x00\xFF"[..]);
            } else {
                res.put_u8(*x);
            }
        });

        res.put_u8(b'\x00');
    }

    pub(crate) fn byte_string(res: &mut BytesMut, b: &[u8]) {
        escaped(res, BYTE_STRING, b)
    }

    pub(crate) fn unicode_string(res: &mut BytesMut, s: &str) {
        escaped(res, UNICODE_STRING, s.as_bytes())
    }

    // Integers are stored big-endian in the minimum number of bytes.
    // The typecode encodes the length and the sign. Negative integers
    // are stored as the one's complement of their magnitude, so that
    // they sort correctly.
    pub(crate) fn integer(res: &mut BytesMut, i: i64) {
        if i == 0 {
            res.put_u8(INT_ZERO);
            return;
        }

        let magnitude = i.unsigned_abs();
        let len = 8 - (magnitude.leading_zeros() / 8) as usize;
        let be = magnitude.to_be_bytes();
        let significant = &be[8 - len..];

        if i > 0 {
            res.put_u8(INT_ZERO + len as u8);
            res.put(significant);
        } else {
            res.put_u8(INT_ZERO - len as u8);
            significant.iter().for_each(|x| res.put_u8(!*x));
        }
    }
}

pub(self) mod parser {
    use bytes::{BufMut, Bytes, BytesMut};
    use nom::error::{Error, ErrorKind};
    use nom::{bytes as nom_bytes, IResult};

    use std::convert::TryFrom;

    use crate::tuple::Tuple;

    use super::{TupleValue, BYTE_STRING, INT_ZERO, NEG_INT_8, POS_INT_8, UNICODE_STRING};

    fn fail(i: &[u8]) -> nom::Err<Error<&[u8]>> {
        nom::Err::Error(Error::new(i, ErrorKind::Fail))
    }

    pub(crate) fn tuple(mut i: &[u8]) -> IResult<&[u8], Tuple> {
        let mut res = Vec::new();

        loop {
            match i.len() {
                0 => return Ok((i, Tuple::from_elements(res))),
                _ => {
                    let (i1, tv) = match i[0] {
                        BYTE_STRING => byte_string(i),
                        UNICODE_STRING => unicode_string(i),
                        NEG_INT_8..=POS_INT_8 => integer(i),
                        _ => Err(fail(i)),
                    }?;

                    res.push(tv);
                    i = i1;
                }
            }
        }
    }

    // Undo the `\x00` -> `\x00\xFF` escaping, consuming the
    // terminating `\x00`.
    fn extract_unpacked_bytes(mut i: &[u8]) -> IResult<&[u8], Bytes> {
        let mut res_output = BytesMut::new();

        loop {
            let (i1, o1) = nom_bytes::complete::take_until(&b"\x00"[..])(i)?;
            res_output.put(o1);

            // At this time i1 is either b"\x00", or b"\x00\xFF", or
            // b"\x00....".
            if i1.len() >= 2 && i1[1] == b'\xFF' {
                res_output.put_u8(b'\x00');
                i = &i1[2..];
            } else {
                return Ok((&i1[1..], res_output.into()));
            }
        }
    }

    fn byte_string(i: &[u8]) -> IResult<&[u8], TupleValue> {
        let (i1, _) = nom_bytes::complete::tag(&[BYTE_STRING][..])(i)?;
        let (res_input, res_output) = extract_unpacked_bytes(i1)?;

        Ok((res_input, TupleValue::ByteString(res_output)))
    }

    fn unicode_string(i: &[u8]) -> IResult<&[u8], TupleValue> {
        let (i1, _) = nom_bytes::complete::tag(&[UNICODE_STRING][..])(i)?;
        let (res_input, res_bytes) = extract_unpacked_bytes(i1)?;

        let res_string = String::from_utf8(res_bytes.to_vec()).map_err(|_| fail(res_input))?;

        Ok((res_input, TupleValue::UnicodeString(res_string)))
    }

    fn integer(i: &[u8]) -> IResult<&[u8], TupleValue> {
        let typecode = i[0];
        let len = usize::from(if typecode >= INT_ZERO {
            typecode - INT_ZERO
        } else {
            INT_ZERO - typecode
        });

        let (res_input, raw) = nom_bytes::complete::take(len)(&i[1..])?;

        let magnitude = raw.iter().fold(0u64, |acc, x| {
            let x = if typecode < INT_ZERO { !*x } else { *x };
            (acc << 8) | u64::from(x)
        });

        let value = if typecode >= INT_ZERO {
            i64::try_from(magnitude).map_err(|_| fail(i))?
        } else {
            i64::try_from(-i128::from(magnitude)).map_err(|_| fail(i))?
        };

        Ok((res_input, TupleValue::Integer(value)))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use crate::error::{FdbError, TUPLE_FROM_BYTES};
    use crate::tuple::Tuple;

    use super::{from_bytes, to_bytes};

    fn int_tuple(i: i64) -> Tuple {
        let mut t = Tuple::new();
        t.add_i64(i);
        t
    }

    #[test]
    fn integer_encoding() {
        assert_eq!(to_bytes(&int_tuple(0)), Bytes::from_static(&b"\x14"[..]));
        assert_eq!(to_bytes(&int_tuple(1)), Bytes::from_static(&b"\x15\x01"[..]));
        assert_eq!(to_bytes(&int_tuple(-1)), Bytes::from_static(&b"\x13\xFE"[..]));
        assert_eq!(
            to_bytes(&int_tuple(256)),
            Bytes::from_static(&b"\x16\x01\x00"[..])
        );
        assert_eq!(
            to_bytes(&int_tuple(i64::MAX)),
            Bytes::from_static(&b"\x1C\x7F\xFF\xFF\xFF\xFF\xFF\xFF\xFF"[..])
        );
        assert_eq!(
            to_bytes(&int_tuple(i64::MIN)),
            Bytes::from_static(&b"\x0C\x7F\xFF\xFF\xFF\xFF\xFF\xFF\xFF"[..])
        );
    }

    #[test]
    fn integer_order() {
        let values = vec![
            i64::MIN,
            -4294967296,
            -65536,
            -256,
            -255,
            -1,
            0,
            1,
            255,
            256,
            65536,
            4294967296,
            i64::MAX,
        ];

        for w in values.windows(2) {
            assert!(to_bytes(&int_tuple(w[0])) < to_bytes(&int_tuple(w[1])));
        }

        for v in values {
            assert_eq!(from_bytes(to_bytes(&int_tuple(v))).unwrap(), int_tuple(v));
        }
    }

    #[test]
    fn string_escaping() {
        let mut t = Tuple::new();
        t.add_bytes(Bytes::from_static(&b"foo\x00bar"[..]));
        t.add_string("hello".to_string());

        assert_eq!(
            to_bytes(&t),
            Bytes::from_static(&b"\x01foo\x00\xFFbar\x00\x02hello\x00"[..])
        );
        assert_eq!(from_bytes(to_bytes(&t)).unwrap(), t);
    }

    #[test]
    fn invalid_input() {
        assert_eq!(
            from_bytes(Bytes::from_static(&b"\x01unterminated"[..])),
            Err(FdbError::new(TUPLE_FROM_BYTES))
        );
        assert_eq!(
            from_bytes(Bytes::from_static(&b"\x15"[..])),
            Err(FdbError::new(TUPLE_FROM_BYTES))
        );
        assert_eq!(
            from_bytes(Bytes::from_static(&b"\x33"[..])),
            Err(FdbError::new(TUPLE_FROM_BYTES))
        );
        // Positive 8 byte integer that does not fit into `i64`.
        assert_eq!(
            from_bytes(Bytes::from_static(&b"\x1C\x80\x00\x00\x00\x00\x00\x00\x00"[..])),
            Err(FdbError::new(TUPLE_FROM_BYTES))
        );
    }
}
