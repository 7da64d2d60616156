// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! LEB128 encoding and decoding.
//!
//! Values are split into 7-bit groups, least significant first, with bit 7 of
//! each byte signalling that another group follows. Decoding reads at most
//! `ceil(width / 7)` groups (5 for 32-bit values, 10 for 64-bit ones); the
//! payload of a final, maximal group is masked to the bits remaining in the
//! width. Out-of-range high bits are dropped rather than reported.

use core::{fmt, ops};

const CONTENT_MASK: u8 = 0x7f;
const CONTINUATION_BIT: u8 = 0x80;
const SIGN_BIT: u8 = 0x40;

/// The maximum length of an encoding of any supported type.
pub const MAX_ENCODED_LEN: usize = 10;

/// A LEB128-encodable integral type.
pub trait Leb128:
    Copy                           //
    + Eq                           //
    + From<u8>                     //
    + ops::BitOrAssign             //
    + ops::Not<Output = Self>      //
    + ops::Shl<u32, Output = Self> //
    + ops::Shr<u32, Output = Self> //
{
    /// The width of the type in bits.
    const MAX_BITS: u32;
    /// Whether the type is encoded as signed LEB128.
    const IS_SIGNED: bool;

    /// The low 8 bits of the value.
    fn low_byte(self) -> u8;
}

macro_rules! impl_leb128 {
    ($type:ty, $signed:literal) => {
        impl Leb128 for $type {
            const MAX_BITS: u32 = <$type>::BITS;
            const IS_SIGNED: bool = $signed;

            #[allow(clippy::cast_sign_loss)]
            fn low_byte(self) -> u8 {
                self as u8
            }
        }
    };
}

impl_leb128!(u32, false);
impl_leb128!(u64, false);
impl_leb128!(i32, true);
impl_leb128!(i64, true);

/// Reads a LEB128-encoded value using the provided byte source function,
/// returning the value along with the number of bytes consumed.
///
/// The only failure mode is that of the byte source.
pub fn read<T, F, E>(mut read_byte: F) -> Result<(T, usize), E>
where
    T: Leb128,
    F: FnMut() -> Result<u8, E>,
{
    let mut result = T::from(0);
    let mut shift = 0;
    let mut count = 0;
    let mut byte;

    loop {
        byte = read_byte()?;
        count += 1;

        let mut content = byte & CONTENT_MASK;
        let remaining_bits = T::MAX_BITS - shift;
        if remaining_bits < 7 {
            content &= (1u8 << remaining_bits) - 1;
        }
        result |= T::from(content) << shift;
        shift += 7;

        if byte & CONTINUATION_BIT == 0 || shift >= T::MAX_BITS {
            break;
        }
    }

    // Sign extend if this is a signed type and the sign bit is set.
    if T::IS_SIGNED && shift < T::MAX_BITS && (byte & SIGN_BIT) != 0 {
        result |= !T::from(0) << shift;
    }
    Ok((result, count))
}

/// Writes the minimal LEB128 encoding of a value through the provided byte
/// sink, returning the number of bytes written.
pub fn write<T, F>(mut value: T, mut write_byte: F) -> usize
where
    T: Leb128,
    F: FnMut(u8),
{
    let zero = T::from(0);
    let mut count = 0;
    loop {
        let group = value.low_byte() & CONTENT_MASK;
        value = value >> 7;
        count += 1;

        // A signed encoding may only stop once the rest of the value is pure
        // sign extension of the group just emitted.
        let last = if T::IS_SIGNED {
            (value == zero && group & SIGN_BIT == 0) || (value == !zero && group & SIGN_BIT != 0)
        } else {
            value == zero
        };
        if last {
            write_byte(group);
            return count;
        }
        write_byte(group | CONTINUATION_BIT);
    }
}

/// A fixed-capacity LEB128 encoding.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct Encoded {
    bytes: [u8; MAX_ENCODED_LEN],
    len: u8,
}

impl ops::Deref for Encoded {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

impl AsRef<[u8]> for Encoded {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl fmt::Debug for Encoded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x?}", &**self)
    }
}

/// Encodes a value into a fixed-capacity buffer.
pub fn encode<T: Leb128>(value: T) -> Encoded {
    let mut bytes = [0u8; MAX_ENCODED_LEN];
    let mut len = 0;
    write(value, |byte| {
        bytes[len] = byte;
        len += 1;
    });
    Encoded {
        bytes,
        len: len as u8,
    }
}
