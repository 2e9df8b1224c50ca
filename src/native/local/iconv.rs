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

//! Character-set conversion streams.

use std::sync::{Arc, Mutex};

use encoding_rs::mem::decode_latin1;
use encoding_rs::{
    Decoder, DecoderResult, Encoder, EncoderResult, Encoding, UTF_16BE,
    UTF_16LE, UTF_8,
};
use log::debug;
use nix::errno::Errno;

use super::lock;
use super::stream::{Backend, StreamObj};
use crate::filter::FallbackMode;
use crate::native::Outcome;
use crate::stream::StreamFlags;

/// How many bytes of earlier input are kept around, so that a malformed
/// sequence straddling two chunks can still be reproduced by the fallback.
const TAIL_LEN: usize = 8;

/// A character set as far as conversion is concerned.
///
/// ISO-8859-1 and US-ASCII are handled here rather than by `encoding_rs`,
/// which follows the web in treating both as windows-1252.
#[derive(Clone, Copy, PartialEq)]
enum Charset {
    Latin1,
    Ascii,
    Other(&'static Encoding),
}

impl Charset {
    fn name(self) -> &'static str {
        match self {
            Charset::Latin1 => "ISO-8859-1",
            Charset::Ascii => "US-ASCII",
            Charset::Other(encoding) => encoding.name(),
        }
    }
}

enum Source {
    Latin1,
    Ascii,
    Other(Decoder),
}

enum Target {
    Utf8,
    Utf16 { big_endian: bool },
    /// One byte per character, up to and including `limit`.
    Bytes { limit: u32 },
    Other(Encoder),
}

enum Mode {
    Pass,
    Convert { source: Source, target: Target },
}

/// An incremental conversion from one character set to another.
pub(super) struct Converter {
    mode: Mode,
    fallback: FallbackMode,
    tail: Vec<u8>,
}

const LATIN1_LABELS: &[&str] = &[
    "iso-8859-1",
    "iso8859-1",
    "iso_8859-1",
    "iso_8859-1:1987",
    "iso-ir-100",
    "latin1",
    "l1",
    "cp819",
    "ibm819",
    "csisolatin1",
];

const ASCII_LABELS: &[&str] = &[
    "us-ascii",
    "ascii",
    "us",
    "ansi_x3.4-1968",
    "iso646-us",
    "iso-ir-6",
    "iso_646.irv:1991",
    "cp367",
    "ibm367",
    "csascii",
];

fn lookup(label: &str) -> Outcome<Charset> {
    let label = label.trim().to_ascii_lowercase();
    if LATIN1_LABELS.contains(&label.as_str()) {
        Ok(Charset::Latin1)
    } else if ASCII_LABELS.contains(&label.as_str()) {
        Ok(Charset::Ascii)
    } else {
        Encoding::for_label_no_replacement(label.as_bytes())
            .map(Charset::Other)
            .ok_or_else(|| Errno::EINVAL.into())
    }
}

fn push_octal(text: &mut String, bytes: &[u8]) {
    for &b in bytes {
        if b.is_ascii_graphic() || b' ' == b {
            text.push(char::from(b));
        } else {
            text.push_str(&format!("\\{:03o}", b));
        }
    }
}

impl Converter {
    pub(super) fn new(
        from: &str,
        to: &str,
        fallback: FallbackMode,
    ) -> Outcome<Self> {
        let from = lookup(from)?;
        let to = lookup(to)?;

        let mode = if from == to {
            Mode::Pass
        } else {
            let source = match from {
                Charset::Latin1 => Source::Latin1,
                Charset::Ascii => Source::Ascii,
                Charset::Other(encoding) => {
                    Source::Other(encoding.new_decoder_without_bom_handling())
                },
            };
            let target = match to {
                Charset::Latin1 => Target::Bytes { limit: 0xFF },
                Charset::Ascii => Target::Bytes { limit: 0x7F },
                Charset::Other(encoding) if UTF_8 == encoding => Target::Utf8,
                Charset::Other(encoding)
                    if UTF_16LE == encoding || UTF_16BE == encoding =>
                {
                    Target::Utf16 {
                        big_endian: UTF_16BE == encoding,
                    }
                },
                Charset::Other(encoding) => {
                    Target::Other(encoding.new_encoder())
                },
            };
            Mode::Convert { source, target }
        };

        debug!(
            "Converting {} to {} with fallback {}",
            from.name(),
            to.name(),
            fallback
        );
        Ok(Converter {
            mode,
            fallback,
            tail: Vec::new(),
        })
    }

    /// Converts `input`, appending the result to `out`.
    ///
    /// `last` marks the end of the input; an incomplete sequence left over at
    /// that point is malformed.
    pub(super) fn convert(
        &mut self,
        input: &[u8],
        last: bool,
        out: &mut Vec<u8>,
    ) -> Outcome<()> {
        let (source, target) = match self.mode {
            Mode::Pass => {
                out.extend_from_slice(input);
                return Ok(());
            },
            Mode::Convert {
                ref mut source,
                ref mut target,
            } => (source, target),
        };
        let fallback = self.fallback;

        let mut text = String::new();
        match *source {
            Source::Latin1 => text.push_str(&decode_latin1(input)),
            Source::Ascii => {
                for &b in input {
                    if b.is_ascii() {
                        text.push(char::from(b));
                    } else {
                        malformed(target, &mut text, &[b], fallback, out)?;
                    }
                }
            },
            Source::Other(ref mut decoder) => {
                let mut consumed = 0;
                loop {
                    let src = &input[consumed..];
                    text.reserve(
                        decoder
                            .max_utf8_buffer_length_without_replacement(
                                src.len(),
                            )
                            .ok_or(Errno::ENOMEM)?,
                    );
                    let (result, read) = decoder
                        .decode_to_string_without_replacement(
                            src, &mut text, last,
                        );
                    consumed += read;

                    match result {
                        DecoderResult::InputEmpty => break,
                        DecoderResult::OutputFull => {
                            encode(target, &text, false, fallback, out)?;
                            text.clear();
                        },
                        DecoderResult::Malformed(bad, extra) => {
                            let end = consumed - usize::from(extra);
                            let bad = usize::from(bad);
                            let mut bytes = Vec::with_capacity(bad);
                            if bad > end {
                                let from_tail =
                                    (bad - end).min(self.tail.len());
                                bytes.extend_from_slice(
                                    &self.tail[self.tail.len() - from_tail..],
                                );
                                bytes.extend_from_slice(&input[..end]);
                            } else {
                                bytes
                                    .extend_from_slice(&input[end - bad..end]);
                            }
                            malformed(
                                target, &mut text, &bytes, fallback, out,
                            )?;
                        },
                    }
                }
            },
        }

        encode(target, &text, last, fallback, out)?;

        self.tail.extend_from_slice(input);
        if self.tail.len() > TAIL_LEN {
            self.tail.drain(..self.tail.len() - TAIL_LEN);
        }
        Ok(())
    }
}

/// Applies the fallback to `bytes`, which are not valid in the source
/// character set. `text` is the decoded text preceding them.
fn malformed(
    target: &mut Target,
    text: &mut String,
    bytes: &[u8],
    fallback: FallbackMode,
    out: &mut Vec<u8>,
) -> Outcome<()> {
    match fallback {
        FallbackMode::None => Err(Errno::EILSEQ.into()),
        FallbackMode::CopyPass => {
            encode(target, text, false, fallback, out)?;
            text.clear();
            out.extend_from_slice(bytes);
            Ok(())
        },
        FallbackMode::CopyOctal => {
            push_octal(text, bytes);
            Ok(())
        },
    }
}

fn encode(
    target: &mut Target,
    text: &str,
    last: bool,
    fallback: FallbackMode,
    out: &mut Vec<u8>,
) -> Outcome<()> {
    match *target {
        Target::Utf8 => {
            out.extend_from_slice(text.as_bytes());
            Ok(())
        },
        Target::Utf16 { big_endian } => {
            for unit in text.encode_utf16() {
                out.extend_from_slice(&if big_endian {
                    unit.to_be_bytes()
                } else {
                    unit.to_le_bytes()
                });
            }
            Ok(())
        },
        Target::Bytes { limit } => {
            for ch in text.chars() {
                let code = u32::from(ch);
                if code <= limit {
                    out.push(code as u8);
                    continue;
                }

                let mut utf8 = [0u8; 4];
                let bytes = ch.encode_utf8(&mut utf8).as_bytes();
                match fallback {
                    FallbackMode::None => return Err(Errno::EILSEQ.into()),
                    FallbackMode::CopyPass => out.extend_from_slice(bytes),
                    FallbackMode::CopyOctal => {
                        let mut escaped = String::new();
                        push_octal(&mut escaped, bytes);
                        out.extend_from_slice(escaped.as_bytes());
                    },
                }
            }
            Ok(())
        },
        Target::Other(ref mut encoder) => {
            encode_with(encoder, text, last, fallback, out)
        },
    }
}

fn encode_with(
    encoder: &mut Encoder,
    mut text: &str,
    last: bool,
    fallback: FallbackMode,
    out: &mut Vec<u8>,
) -> Outcome<()> {
    let mut buf = Vec::new();
    loop {
        buf.resize(
            encoder
                .max_buffer_length_from_utf8_without_replacement(text.len())
                .ok_or(Errno::ENOMEM)?,
            0,
        );
        let (result, read, written) =
            encoder.encode_from_utf8_without_replacement(text, &mut buf, last);
        out.extend_from_slice(&buf[..written]);
        text = &text[read..];

        match result {
            EncoderResult::InputEmpty => return Ok(()),
            EncoderResult::OutputFull => (),
            EncoderResult::Unmappable(ch) => {
                let mut utf8 = [0u8; 4];
                let bytes = ch.encode_utf8(&mut utf8).as_bytes();
                match fallback {
                    FallbackMode::None => return Err(Errno::EILSEQ.into()),
                    FallbackMode::CopyPass => out.extend_from_slice(bytes),
                    FallbackMode::CopyOctal => {
                        let mut escaped = String::new();
                        push_octal(&mut escaped, bytes);
                        // Escapes are ASCII, which every target can represent
                        encode_with(encoder, &escaped, false, fallback, out)?;
                    },
                }
            },
        }
    }
}

/// A stream converting what is read from, or written to, another stream.
pub(super) struct IconvBackend {
    upstream: Arc<Mutex<StreamObj>>,
    converter: Converter,
    writing: bool,
    input: Vec<u8>,
    output: Vec<u8>,
    delivered: usize,
    eof: bool,
}

impl IconvBackend {
    pub(super) fn new(
        upstream: Arc<Mutex<StreamObj>>,
        converter: Converter,
        chunk_size: usize,
    ) -> Self {
        IconvBackend {
            upstream,
            converter,
            writing: false,
            input: vec![0u8; chunk_size.max(1)],
            output: Vec::new(),
            delivered: 0,
            eof: false,
        }
    }
}

impl Backend for IconvBackend {
    fn open(&mut self, flags: StreamFlags) -> Outcome<()> {
        self.writing = flags.writable();
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Outcome<usize> {
        // Keep pulling from upstream until there is output or nothing more
        // will come, so that an empty read always means the end.
        loop {
            if self.delivered < self.output.len() {
                let n = buf.len().min(self.output.len() - self.delivered);
                buf[..n].copy_from_slice(
                    &self.output[self.delivered..self.delivered + n],
                );
                self.delivered += n;
                return Ok(n);
            }

            if self.eof {
                return Ok(0);
            }

            self.output.clear();
            self.delivered = 0;
            let n = lock(&self.upstream).read(&mut self.input)?;
            if 0 == n {
                self.eof = true;
                self.converter.convert(&[], true, &mut self.output)?;
            } else {
                self.converter.convert(
                    &self.input[..n],
                    false,
                    &mut self.output,
                )?;
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> Outcome<usize> {
        let mut converted = Vec::new();
        self.converter.convert(buf, false, &mut converted)?;
        lock(&self.upstream).write_all(&converted)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Outcome<()> {
        lock(&self.upstream).flush()
    }

    fn close(&mut self) -> Outcome<()> {
        if self.writing {
            let mut rest = Vec::new();
            self.converter.convert(&[], true, &mut rest)?;
            let mut upstream = lock(&self.upstream);
            upstream.write_all(&rest)?;
            upstream.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::support::status::Status;

    fn convert_chunks(
        chunks: &[&[u8]],
        from: &str,
        to: &str,
        fallback: FallbackMode,
    ) -> Outcome<Vec<u8>> {
        let mut converter = Converter::new(from, to, fallback)?;
        let mut out = Vec::new();
        for chunk in chunks {
            converter.convert(chunk, false, &mut out)?;
        }
        converter.convert(&[], true, &mut out)?;
        Ok(out)
    }

    #[test]
    fn sequences_split_across_chunks() {
        let euro = "€".as_bytes();
        assert_eq!(
            vec![0xac, 0x20],
            convert_chunks(
                &[&euro[..1], &euro[1..2], &euro[2..]],
                "UTF-8",
                "UTF-16LE",
                FallbackMode::None
            )
            .unwrap()
        );
    }

    #[test]
    fn copy_pass_across_chunks() {
        // A truncated sequence followed by ASCII in the next chunk
        assert_eq!(
            b"a\xe2\x82b".to_vec(),
            convert_chunks(
                &[b"a\xe2", b"\x82b"],
                "UTF-8",
                "windows-1252",
                FallbackMode::CopyPass
            )
            .unwrap()
        );
    }

    #[test]
    fn legacy_to_legacy() {
        // The euro sign sits at different code points in the two sets
        assert_eq!(
            b"\xe9t\xa4".to_vec(),
            convert_chunks(
                &[b"\xe9t\x80"],
                "windows-1252",
                "ISO-8859-15",
                FallbackMode::None
            )
            .unwrap()
        );
        assert_eq!(
            "ét".as_bytes().to_vec(),
            convert_chunks(&[b"\xe9t"], "latin1", "utf8", FallbackMode::None)
                .unwrap()
        );
    }

    #[test]
    fn latin1_is_not_windows_1252() {
        // C1 controls map to themselves rather than to the euro sign
        assert_eq!(
            vec![0xc2, 0x80],
            convert_chunks(
                &[b"\x80"],
                "ISO-8859-1",
                "UTF-8",
                FallbackMode::None
            )
            .unwrap()
        );
        assert_eq!(
            vec![0x80],
            convert_chunks(
                &["\u{80}".as_bytes()],
                "UTF-8",
                "Latin1",
                FallbackMode::None
            )
            .unwrap()
        );
        assert!(convert_chunks(
            &["\u{20ac}".as_bytes()],
            "UTF-8",
            "ISO-8859-1",
            FallbackMode::None
        )
        .is_err());
    }

    #[test]
    fn ascii_rejects_eight_bit_characters() {
        let e_acute = "é".as_bytes();
        assert_eq!(
            Err(Status::from(Errno::EILSEQ)),
            convert_chunks(&[e_acute], "UTF-8", "US-ASCII", FallbackMode::None)
        );
        assert_eq!(
            b"\\303\\251".to_vec(),
            convert_chunks(
                &[e_acute],
                "UTF-8",
                "us-ascii",
                FallbackMode::CopyOctal
            )
            .unwrap()
        );
        assert_eq!(
            e_acute.to_vec(),
            convert_chunks(
                &[e_acute],
                "UTF-8",
                "ASCII",
                FallbackMode::CopyPass
            )
            .unwrap()
        );

        assert_eq!(
            Err(Status::from(Errno::EILSEQ)),
            convert_chunks(&[b"a\xe9b"], "ASCII", "UTF-8", FallbackMode::None)
        );
        assert_eq!(
            b"a\\351b".to_vec(),
            convert_chunks(
                &[b"a\xe9b"],
                "ANSI_X3.4-1968",
                "UTF-8",
                FallbackMode::CopyOctal
            )
            .unwrap()
        );
        assert_eq!(
            b"a\x80".to_vec(),
            convert_chunks(
                &[b"a\x80"],
                "US-ASCII",
                "UTF-8",
                FallbackMode::CopyPass
            )
            .unwrap()
        );
    }

    #[test]
    fn unknown_labels() {
        assert!(Converter::new("UTF-8", "no-such-set", FallbackMode::None)
            .is_err());
        // The replacement encoding is not a real character set
        assert!(Converter::new("iso-2022-kr", "UTF-8", FallbackMode::None)
            .is_err());
    }
}
