//-
// Copyright (c) 2026, The mailutils-rs authors
//
// This file is part of mailutils-rs.
//
// mailutils-rs is free software: you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// mailutils-rs is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// mailutils-rs. If not, see <http://www.gnu.org/licenses/>.

//! Streams that transform the bytes of another stream.

use std::fmt;
use std::io::{self, Read, Write};
use std::ops::{Deref, DerefMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::handle::Handle;
use crate::native::HandleKind;
use crate::stream::{Stream, StreamFlags};
use crate::support::error::{Result, ResultExt, Subsystem};

/// What a character-set conversion does with input it cannot convert.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackMode {
    /// Fail the read with `EILSEQ`.
    None,
    /// Copy the offending bytes to the output unchanged.
    CopyPass,
    /// Copy printable ASCII, and write anything else as a `\NNN` octal
    /// escape.
    CopyOctal,
}

impl Default for FallbackMode {
    fn default() -> Self {
        FallbackMode::None
    }
}

impl FromStr for FallbackMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s {
            "none" => Ok(FallbackMode::None),
            "copy-pass" => Ok(FallbackMode::CopyPass),
            "copy-octal" => Ok(FallbackMode::CopyOctal),
            _ => Err(format!(
                "unknown fallback mode '{}' \
                 (expected none, copy-pass or copy-octal)",
                s
            )),
        }
    }
}

impl fmt::Display for FallbackMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            FallbackMode::None => "none",
            FallbackMode::CopyPass => "copy-pass",
            FallbackMode::CopyOctal => "copy-octal",
        })
    }
}

/// A stream whose bytes pass through a transform on their way from (or to)
/// an upstream stream.
///
/// The filter holds a reference to its upstream stream, so the upstream
/// outlives it no matter what the caller does with its own `Stream`. The
/// upstream is released when both the caller's references and the filter
/// are gone.
///
/// A `FilterStream` dereferences to `Stream` and is used exactly like one:
/// reading until a read returns nothing drains both the upstream and the
/// transform's internal buffering.
#[derive(Clone, Debug)]
pub struct FilterStream {
    stream: Stream,
    upstream: Stream,
}

impl FilterStream {
    /// Converts the text of `upstream` from the character set `from` to
    /// `to`.
    ///
    /// `flags` selects the direction: a readable filter converts what is
    /// read from `upstream`, a writable one converts what is written before
    /// passing it on. Unknown character sets fail with `EINVAL`.
    pub fn iconv(
        upstream: &Stream,
        from: &str,
        to: &str,
        fallback: FallbackMode,
        flags: StreamFlags,
    ) -> Result<Self> {
        let engine = upstream.handle().engine_ref();
        let raw = engine
            .iconv_stream_create(
                upstream.handle().raw()?,
                from,
                to,
                fallback,
                flags,
            )
            .or_fail(Subsystem::Stream)?;
        let stream = Stream::from_handle(Handle::acquire(
            engine,
            HandleKind::Stream,
            raw,
        ));
        stream.open()?;

        Ok(FilterStream {
            stream,
            upstream: upstream.clone(),
        })
    }

    pub fn upstream(&self) -> &Stream {
        &self.upstream
    }

    /// Whether reads from this filter have reached the end of both the
    /// upstream and the transform.
    pub fn is_exhausted(&self) -> bool {
        0 == self.stream.read_count()
    }

    /// Reads the next converted chunk. An empty chunk means the end of both
    /// the upstream and the conversion.
    pub fn read(&mut self) -> Result<Vec<u8>> {
        self.stream.read()
    }

    pub fn readline(&mut self) -> Result<Vec<u8>> {
        self.stream.readline()
    }

    /// Converts `data` and passes it on, returning how much was consumed.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.stream.write(data)
    }

    /// Reads everything left, converted.
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let chunk = self.stream.read()?;
            if chunk.is_empty() {
                return Ok(out);
            }
            out.extend_from_slice(&chunk);
        }
    }

    /// Converts the stream into a plain `Stream`, keeping the upstream
    /// alive through the engine's own reference.
    pub fn into_stream(self) -> Stream {
        self.stream
    }
}

impl Deref for FilterStream {
    type Target = Stream;

    fn deref(&self) -> &Stream {
        &self.stream
    }
}

impl DerefMut for FilterStream {
    fn deref_mut(&mut self) -> &mut Stream {
        &mut self.stream
    }
}

impl Read for FilterStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Read::read(&mut self.stream, buf)
    }
}

impl Write for FilterStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Write::write(&mut self.stream, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Write::flush(&mut self.stream)
    }
}

/// Whether `err` is the failure a conversion reports for input it cannot
/// convert.
pub fn is_illegal_sequence(err: &crate::support::error::Error) -> bool {
    err.status() == Some(nix::errno::Errno::EILSEQ.into())
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::native::local;
    use crate::support::error::Error;

    fn convert(
        input: &[u8],
        from: &str,
        to: &str,
        fallback: FallbackMode,
    ) -> Result<Vec<u8>> {
        let engine = local::test_engine();
        let upstream = Stream::memory(&engine, input)?;
        let mut filter = FilterStream::iconv(
            &upstream,
            from,
            to,
            fallback,
            StreamFlags::READ,
        )?;
        filter.read_all()
    }

    #[test]
    fn ten_bytes_of_utf8_to_latin1() {
        crate::init_test_log();
        // "héllo wö" is ten bytes of UTF-8
        let input = "héllo wö".as_bytes();
        assert_eq!(10, input.len());

        let engine = local::test_engine();
        let upstream = Stream::memory(&engine, input).unwrap();
        let mut filter = FilterStream::iconv(
            &upstream,
            "UTF-8",
            "ISO-8859-1",
            FallbackMode::None,
            StreamFlags::READ,
        )
        .unwrap();

        let mut out = Vec::new();
        let mut reads = 0;
        loop {
            let chunk = filter.read().unwrap();
            reads += 1;
            if chunk.is_empty() {
                break;
            }
            out.extend_from_slice(&chunk);
        }

        assert!(filter.is_exhausted());
        assert!(reads >= 2);
        assert_eq!(b"h\xe9llo w\xf6".to_vec(), out);
        // Nothing more after the terminating empty read
        assert!(filter.read().unwrap().is_empty());
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert_eq!(
            Vec::<u8>::new(),
            convert(b"", "UTF-8", "UTF-16LE", FallbackMode::None).unwrap()
        );
    }

    #[test]
    fn utf8_to_utf16() {
        assert_eq!(
            vec![0x41, 0x00, 0xe9, 0x00, 0x3d, 0xd8, 0x00, 0xde],
            convert(
                "Aé\u{1f600}".as_bytes(),
                "UTF-8",
                "UTF-16LE",
                FallbackMode::None
            )
            .unwrap()
        );
        assert_eq!(
            vec![0x00, 0x41],
            convert(b"A", "UTF-8", "UTF-16BE", FallbackMode::None).unwrap()
        );
    }

    #[test]
    fn same_charset_passes_bytes_through() {
        assert_eq!(
            b"\xff\xfe not utf-8".to_vec(),
            convert(b"\xff\xfe not utf-8", "utf-8", "UTF-8", FallbackMode::None)
                .unwrap()
        );
    }

    #[test]
    fn unknown_charset_is_einval() {
        let err = convert(b"x", "UTF-8", "KLINGON", FallbackMode::None)
            .unwrap_err();
        assert_matches!(Error::Stream(_), &err);
        assert_eq!(Some(nix::errno::Errno::EINVAL.into()), err.status());
    }

    #[test]
    fn illegal_input_fails_without_fallback() {
        let err =
            convert(b"ab\xffcd", "UTF-8", "ISO-8859-1", FallbackMode::None)
                .unwrap_err();
        assert!(is_illegal_sequence(&err));
    }

    #[test]
    fn truncated_sequence_at_end_fails() {
        // First two bytes of a three-byte sequence
        let err =
            convert(b"ok\xe2\x82", "UTF-8", "UTF-16LE", FallbackMode::None)
                .unwrap_err();
        assert!(is_illegal_sequence(&err));
    }

    #[test]
    fn copy_pass_copies_offending_bytes() {
        assert_eq!(
            b"ab\xffcd".to_vec(),
            convert(b"ab\xffcd", "UTF-8", "ISO-8859-1", FallbackMode::CopyPass)
                .unwrap()
        );
    }

    #[test]
    fn copy_octal_escapes_offending_bytes() {
        assert_eq!(
            b"ab\\377cd".to_vec(),
            convert(b"ab\xffcd", "UTF-8", "ISO-8859-1", FallbackMode::CopyOctal)
                .unwrap()
        );
        // Characters with no target representation are escaped too
        assert_eq!(
            b"x\\342\\234\\223".to_vec(),
            convert(
                "x\u{2713}".as_bytes(),
                "UTF-8",
                "ISO-8859-1",
                FallbackMode::CopyOctal
            )
            .unwrap()
        );
    }

    #[test]
    fn writing_filter_converts_before_upstream() {
        let engine = local::test_engine();
        let upstream = Stream::memory(&engine, b"").unwrap();
        let mut filter = FilterStream::iconv(
            &upstream,
            "ISO-8859-1",
            "UTF-8",
            FallbackMode::None,
            StreamFlags::WRITE,
        )
        .unwrap();
        filter.write_all(b"caf\xe9").unwrap();
        filter.close().unwrap();

        let mut upstream = upstream;
        assert_eq!("café".as_bytes().to_vec(), upstream.read().unwrap());
    }

    #[test]
    fn upstream_outlives_caller_reference() {
        let engine = local::test_engine();
        let upstream = Stream::memory(&engine, b"abc").unwrap();
        let mut filter = FilterStream::iconv(
            &upstream,
            "UTF-8",
            "UTF-16BE",
            FallbackMode::None,
            StreamFlags::READ,
        )
        .unwrap();
        assert_eq!(2, upstream.handle().ref_count());
        drop(upstream);

        assert_eq!(vec![0, b'a', 0, b'b', 0, b'c'], filter.read_all().unwrap());
    }

    #[test]
    fn fallback_mode_parsing() {
        assert_eq!(Ok(FallbackMode::CopyPass), "copy-pass".parse());
        assert!("copy".parse::<FallbackMode>().is_err());
        assert_eq!("copy-octal", FallbackMode::CopyOctal.to_string());
    }

    proptest! {
        #[test]
        fn utf8_round_trips_through_utf16(s in "\\PC{0,300}") {
            let engine = local::test_engine();
            let upstream = Stream::memory(&engine, s.as_bytes()).unwrap();
            let there = FilterStream::iconv(
                &upstream, "UTF-8", "UTF-16BE",
                FallbackMode::None, StreamFlags::READ,
            ).unwrap();
            let mut back = FilterStream::iconv(
                &there, "UTF-16BE", "UTF-8",
                FallbackMode::None, StreamFlags::READ,
            ).unwrap();
            prop_assert_eq!(s.as_bytes().to_vec(), back.read_all().unwrap());
        }

        #[test]
        fn latin1_round_trips_through_utf8(
            bytes in prop::collection::vec(any::<u8>(), 0..3000)
        ) {
            let engine = local::test_engine();
            let upstream = Stream::memory(&engine, &bytes).unwrap();
            let there = FilterStream::iconv(
                &upstream, "ISO-8859-1", "UTF-8",
                FallbackMode::None, StreamFlags::READ,
            ).unwrap();
            let mut back = FilterStream::iconv(
                &there, "UTF-8", "ISO-8859-1",
                FallbackMode::None, StreamFlags::READ,
            ).unwrap();
            prop_assert_eq!(bytes, back.read_all().unwrap());
        }
    }
}
