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

//! Byte streams.
//!
//! A `Stream` is Unopened, Open or Closed. The constructors here open the
//! stream immediately, so a freshly constructed stream is ready to use; once
//! closed, every further operation fails with `MU_ERR_NOT_OPEN`.
//!
//! Reads return whatever chunk the engine chooses to deliver. A zero-length
//! read means end of stream, which is why every consuming loop in this crate
//! is written as "read until a read returns nothing".

use std::io::{self, Read, Write};
use std::path::Path;

use bitflags::bitflags;
use log::debug;

use crate::handle::Handle;
use crate::message::Message;
use crate::native::{EngineRef, HandleKind, StreamSource};
use crate::support::error::{Result, ResultExt, Subsystem};

bitflags! {
    /// How a stream (or mailbox, or mailer) is opened.
    pub struct StreamFlags: u32 {
        const READ = 0x0000_0001;
        const WRITE = 0x0000_0002;
        const RDWR = 0x0000_0004;
        const APPEND = 0x0000_0008;
        const CREAT = 0x0000_0010;
        const NONBLOCK = 0x0000_0020;
        const NO_CHECK = 0x0000_0040;
        const SEEKABLE = 0x0000_0080;
        const NO_CLOSE = 0x0000_0100;
        const ALLOW_LINKS = 0x0000_0200;
        const NONLOCK = 0x0000_0400;
        const QACCESS = 0x0000_0800;
        const IRGRP = 0x0000_1000;
        const IWGRP = 0x0000_2000;
        const IROTH = 0x0000_4000;
        const IWOTH = 0x0000_8000;
        const IMASK = Self::IRGRP.bits | Self::IWGRP.bits
            | Self::IROTH.bits | Self::IWOTH.bits;
    }
}

bitflags! {
    /// Conditions a caller can wait for on a stream.
    pub struct WaitFlags: u32 {
        const READY_RD = 0x1;
        const READY_WR = 0x2;
    }
}

impl StreamFlags {
    pub fn readable(self) -> bool {
        self.intersects(StreamFlags::READ | StreamFlags::RDWR)
    }

    pub fn writable(self) -> bool {
        self.intersects(
            StreamFlags::WRITE | StreamFlags::RDWR | StreamFlags::APPEND,
        )
    }
}

/// The standard input descriptor, for `Stream::stdio`.
pub const STDIN_FD: i32 = 0;
/// The standard output descriptor, for `Stream::stdio`.
pub const STDOUT_FD: i32 = 1;
/// The standard error descriptor, for `Stream::stdio`.
pub const STDERR_FD: i32 = 2;

/// The largest chunk requested from the engine in one read.
///
/// The engine may deliver less; it never delivers more.
const READ_LIMIT: usize = 4096;

/// A byte stream held by the engine.
///
/// Clones refer to the same native stream. Each clone tracks the byte counts
/// of its own most recent read and write.
#[derive(Clone, Debug)]
pub struct Stream {
    handle: Handle,
    read_count: usize,
    write_count: usize,
}

impl Stream {
    /// Wraps an existing stream handle.
    pub fn from_handle(handle: Handle) -> Self {
        debug_assert_eq!(HandleKind::Stream, handle.kind());
        Stream {
            handle,
            read_count: 0,
            write_count: 0,
        }
    }

    fn create(
        engine: &EngineRef,
        source: StreamSource<'_>,
        flags: StreamFlags,
    ) -> Result<Self> {
        let raw = engine
            .stream_create(source, flags)
            .or_fail(Subsystem::Stream)?;
        let stream = Stream::from_handle(Handle::acquire(
            engine,
            HandleKind::Stream,
            raw,
        ));
        stream.open()?;
        Ok(stream)
    }

    /// Opens the file at `path`.
    pub fn file(
        engine: &EngineRef,
        path: &Path,
        flags: StreamFlags,
    ) -> Result<Self> {
        Stream::create(engine, StreamSource::File(path), flags)
    }

    /// Connects to `host`:`port`.
    pub fn tcp(
        engine: &EngineRef,
        host: &str,
        port: u16,
        flags: StreamFlags,
    ) -> Result<Self> {
        Stream::create(engine, StreamSource::Tcp { host, port }, flags)
    }

    /// Wraps one of the standard descriptors `STDIN_FD`, `STDOUT_FD` or
    /// `STDERR_FD`.
    pub fn stdio(
        engine: &EngineRef,
        fd: i32,
        flags: StreamFlags,
    ) -> Result<Self> {
        Stream::create(engine, StreamSource::Stdio(fd), flags)
    }

    /// Creates an in-memory stream holding a copy of `content`, positioned at
    /// its start.
    pub fn memory(engine: &EngineRef, content: &[u8]) -> Result<Self> {
        Stream::create(engine, StreamSource::Memory(content), StreamFlags::RDWR)
    }

    /// Runs `command` through the shell.
    ///
    /// A readable stream reads the command's standard output; a writable one
    /// feeds its standard input.
    pub fn program(
        engine: &EngineRef,
        command: &str,
        flags: StreamFlags,
    ) -> Result<Self> {
        Stream::create(engine, StreamSource::Program(command), flags)
    }

    /// Runs `command` through the shell with its standard input fed from
    /// `input`. Reading the returned stream reads the command's output.
    pub fn filter_program(
        engine: &EngineRef,
        command: &str,
        input: &Stream,
    ) -> Result<Self> {
        let input = input.handle.raw()?;
        Stream::create(
            engine,
            StreamSource::FilterProgram { command, input },
            StreamFlags::READ,
        )
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// The number of bytes returned by the most recent read.
    pub fn read_count(&self) -> usize {
        self.read_count
    }

    /// The number of bytes accepted by the most recent write.
    pub fn write_count(&self) -> usize {
        self.write_count
    }

    pub fn open(&self) -> Result<()> {
        self.handle
            .engine()
            .stream_open(self.handle.raw()?)
            .or_fail(Subsystem::Stream)
    }

    pub fn close(&self) -> Result<()> {
        debug!("Closing {:?}", self.handle);
        self.handle
            .engine()
            .stream_close(self.handle.raw()?)
            .or_fail(Subsystem::Stream)
    }

    pub fn flush(&self) -> Result<()> {
        self.handle
            .engine()
            .stream_flush(self.handle.raw()?)
            .or_fail(Subsystem::Stream)
    }

    /// Blocks until the stream is ready for at least one of `flags`.
    pub fn wait(&self, flags: WaitFlags) -> Result<WaitFlags> {
        self.handle
            .engine()
            .stream_wait(self.handle.raw()?, flags)
            .or_fail(Subsystem::Stream)
    }

    /// Reads the next chunk. An empty chunk means end of stream.
    pub fn read(&mut self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; READ_LIMIT];
        let n = self
            .handle
            .engine()
            .stream_read(self.handle.raw()?, &mut buf)
            .or_fail(Subsystem::Stream)?;
        buf.truncate(n);
        self.read_count = n;
        Ok(buf)
    }

    /// Reads through the next line terminator, or as much of the line as the
    /// engine delivers in one chunk. An empty result means end of stream.
    pub fn readline(&mut self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; READ_LIMIT];
        let n = self
            .handle
            .engine()
            .stream_readline(self.handle.raw()?, &mut buf)
            .or_fail(Subsystem::Stream)?;
        buf.truncate(n);
        self.read_count = n;
        Ok(buf)
    }

    /// Writes some prefix of `data`, returning how much was written.
    ///
    /// The count may be short; callers wanting everything written loop, or
    /// use the `io::Write` implementation.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let n = self
            .handle
            .engine()
            .stream_write(self.handle.raw()?, data)
            .or_fail(Subsystem::Stream)?;
        self.write_count = n;
        Ok(n)
    }

    /// Parses the rest of the stream as a message.
    pub fn to_message(&self) -> Result<Message> {
        let engine = self.handle.engine_ref();
        let raw = engine
            .stream_to_message(self.handle.raw()?)
            .or_fail(Subsystem::Stream)?;
        Ok(Message::from_handle(Handle::acquire(
            engine,
            HandleKind::Message,
            raw,
        )))
    }

    /// Tears the native stream down immediately, on behalf of every clone.
    pub fn dispose(&self) -> Result<()> {
        self.handle.dispose()
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let raw = self.handle.raw()?;
        let n = self
            .handle
            .engine()
            .stream_read(raw, buf)
            .or_fail(Subsystem::Stream)?;
        self.read_count = n;
        Ok(n)
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(Stream::write(self, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(Stream::flush(self)?)
    }
}
