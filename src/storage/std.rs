// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

use std::io;

use super::Stream;

/// Stream implementation for `std::io` readers.
///
/// The offset is tracked by the wrapper itself, so the underlying reader need
/// not be seekable.
#[derive(Debug)]
pub struct Reader<R: io::Read> {
    inner: R,
    pos: usize,
}

impl<R: io::Read> Reader<R> {
    /// Wraps the given reader, treating its current position as offset zero.
    pub fn new(inner: R) -> Self {
        Self { inner, pos: 0 }
    }

    /// Returns the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: io::Read> Stream for Reader<R> {
    type Error = io::Error;

    fn is_eof(err: &Self::Error) -> bool {
        err.kind() == io::ErrorKind::UnexpectedEof
    }

    fn offset(&mut self) -> usize {
        self.pos
    }

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    // A failed read leaves the offset past whatever bytes did arrive, as
    // those are gone from the inner reader.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        let mut remaining = buf;
        while !remaining.is_empty() {
            match io::Read::read(&mut self.inner, remaining) {
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(n) => {
                    self.pos += n;
                    let rest = remaining;
                    remaining = &mut rest[n..];
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_reader_tracks_offset() {
        let mut reader = Reader::new(Cursor::new(vec![0xaau8, 0xbb, 0xcc, 0xdd]));
        assert_eq!(reader.read_byte().unwrap(), 0xaa);
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0xbb, 0xcc]);
        assert_eq!(reader.offset(), 3);
        assert_eq!(reader.read_byte().unwrap(), 0xdd);

        let err = reader.read_byte().unwrap_err();
        assert!(Reader::<Cursor<Vec<u8>>>::is_eof(&err));
        assert_eq!(reader.offset(), 4);
    }

    #[test]
    fn test_reader_short_read_counts_consumed_bytes() {
        let mut reader = Reader::new(Cursor::new(vec![1u8, 2, 3]));
        let mut buf = [0u8; 5];
        let err = reader.read_exact(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(reader.offset(), 3);
        assert_eq!(reader.into_inner().position(), 3);
    }

    // Hands out at most one byte per read.
    struct Trickle(Cursor<Vec<u8>>);

    impl io::Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let len = buf.len().min(1);
            io::Read::read(&mut self.0, &mut buf[..len])
        }
    }

    #[test]
    fn test_reader_fills_from_partial_reads() {
        let mut reader = Reader::new(Trickle(Cursor::new(vec![1u8, 2, 3, 4])));
        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(reader.offset(), 3);

        let mut buf = [0u8; 2];
        assert!(reader.read_exact(&mut buf).is_err());
        assert_eq!(reader.offset(), 4);
    }
}
