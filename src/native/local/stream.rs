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

//! Stream state and the byte sources behind it.

use std::collections::VecDeque;
use std::fs;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

use log::{debug, warn};
use memchr::memchr;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags};

use super::lock;
use crate::native::Outcome;
use crate::stream::{StreamFlags, WaitFlags};
use crate::support::status::{Code, Status};

fn io_status(e: io::Error) -> Status {
    Status::from_io(&e)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Unopened,
    Open,
    Closed,
}

/// Where the bytes of a stream actually come from or go to.
///
/// The state machine and access checks live in `StreamObj`; a backend only
/// moves bytes.
pub(super) trait Backend: Send {
    fn open(&mut self, _flags: StreamFlags) -> Outcome<()> {
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Outcome<usize>;
    fn write(&mut self, buf: &[u8]) -> Outcome<usize>;

    fn flush(&mut self) -> Outcome<()> {
        Ok(())
    }

    fn close(&mut self) -> Outcome<()> {
        Ok(())
    }

    fn wait(&mut self, flags: WaitFlags) -> Outcome<WaitFlags> {
        Ok(flags)
    }
}

pub(super) struct StreamObj {
    flags: StreamFlags,
    state: State,
    chunk_size: usize,
    /// Bytes fetched from the backend by `readline()` but not yet delivered.
    pending: Vec<u8>,
    backend: Box<dyn Backend>,
}

impl StreamObj {
    pub(super) fn new(
        backend: Box<dyn Backend>,
        flags: StreamFlags,
        chunk_size: usize,
    ) -> Self {
        StreamObj {
            flags,
            state: State::Unopened,
            chunk_size: chunk_size.max(1),
            pending: Vec::new(),
            backend,
        }
    }

    pub(super) fn flags(&self) -> StreamFlags {
        self.flags
    }

    pub(super) fn open(&mut self) -> Outcome<()> {
        match self.state {
            State::Open => Ok(()),
            State::Closed => Err(Code::NotOpen.into()),
            State::Unopened => {
                self.backend.open(self.flags)?;
                self.state = State::Open;
                Ok(())
            }
        }
    }

    fn check_open(&self) -> Outcome<()> {
        if State::Open == self.state {
            Ok(())
        } else {
            Err(Code::NotOpen.into())
        }
    }

    fn check_readable(&self) -> Outcome<()> {
        self.check_open()?;
        if self.flags.readable() {
            Ok(())
        } else {
            Err(Errno::EACCES.into())
        }
    }

    fn take_pending(&mut self, buf: &mut [u8], n: usize) -> usize {
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        n
    }

    pub(super) fn read(&mut self, buf: &mut [u8]) -> Outcome<usize> {
        self.check_readable()?;
        let limit = buf.len().min(self.chunk_size);
        if 0 == limit {
            return Ok(0);
        }

        if !self.pending.is_empty() {
            let n = limit.min(self.pending.len());
            return Ok(self.take_pending(buf, n));
        }

        self.backend.read(&mut buf[..limit])
    }

    pub(super) fn readline(&mut self, buf: &mut [u8]) -> Outcome<usize> {
        self.check_readable()?;
        let limit = buf.len().min(self.chunk_size);
        if 0 == limit {
            return Ok(0);
        }

        loop {
            if let Some(eol) = memchr(b'\n', &self.pending) {
                let n = (eol + 1).min(limit);
                return Ok(self.take_pending(buf, n));
            }

            if self.pending.len() >= limit {
                return Ok(self.take_pending(buf, limit));
            }

            let mut chunk = vec![0u8; limit];
            let n = self.backend.read(&mut chunk)?;
            if 0 == n {
                let n = self.pending.len();
                return Ok(self.take_pending(buf, n));
            }
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }

    /// Reads everything up to the end of the stream.
    pub(super) fn read_to_end(&mut self) -> Outcome<Vec<u8>> {
        let mut data = Vec::new();
        let mut chunk = vec![0u8; self.chunk_size];
        loop {
            let n = self.read(&mut chunk)?;
            if 0 == n {
                return Ok(data);
            }
            data.extend_from_slice(&chunk[..n]);
        }
    }

    pub(super) fn write(&mut self, buf: &[u8]) -> Outcome<usize> {
        self.check_open()?;
        if !self.flags.writable() {
            return Err(Errno::EACCES.into());
        }

        self.backend.write(buf)
    }

    /// Writes all of `buf`, looping over short writes.
    pub(super) fn write_all(&mut self, mut buf: &[u8]) -> Outcome<()> {
        while !buf.is_empty() {
            let n = self.write(buf)?;
            if 0 == n {
                return Err(Errno::EIO.into());
            }
            buf = &buf[n..];
        }
        Ok(())
    }

    pub(super) fn flush(&mut self) -> Outcome<()> {
        self.check_open()?;
        self.backend.flush()
    }

    pub(super) fn close(&mut self) -> Outcome<()> {
        self.check_open()?;
        self.state = State::Closed;
        self.pending.clear();
        self.backend.close()
    }

    pub(super) fn wait(&mut self, flags: WaitFlags) -> Outcome<WaitFlags> {
        self.check_open()?;
        if flags.contains(WaitFlags::READY_RD) && !self.pending.is_empty() {
            return Ok(WaitFlags::READY_RD);
        }
        self.backend.wait(flags)
    }
}

/// Blocks until `fd` is ready for one of `flags`.
fn poll_fd(fd: RawFd, flags: WaitFlags) -> Outcome<WaitFlags> {
    let mut events = PollFlags::empty();
    if flags.contains(WaitFlags::READY_RD) {
        events |= PollFlags::POLLIN;
    }
    if flags.contains(WaitFlags::READY_WR) {
        events |= PollFlags::POLLOUT;
    }

    let mut fds = [PollFd::new(fd, events)];
    poll(&mut fds, -1).map_err(|e| {
        e.as_errno()
            .map_or_else(|| Code::Failure.into(), Status::from)
    })?;

    let revents = fds[0].revents().unwrap_or_else(PollFlags::empty);
    let mut ready = WaitFlags::empty();
    if revents.intersects(PollFlags::POLLIN | PollFlags::POLLHUP) {
        ready |= WaitFlags::READY_RD;
    }
    if revents.contains(PollFlags::POLLOUT) {
        ready |= WaitFlags::READY_WR;
    }
    Ok(ready & flags)
}

/// An in-memory buffer.
///
/// Reads consume from the front while writes append to the back, so a
/// memory stream also works as a pipe between a writer and a reader.
/// An in-memory FIFO; bytes are dropped once read.
pub(super) struct MemoryBackend {
    data: VecDeque<u8>,
}

impl MemoryBackend {
    pub(super) fn new(content: &[u8]) -> Self {
        MemoryBackend {
            data: content.iter().copied().collect(),
        }
    }
}

impl Backend for MemoryBackend {
    fn read(&mut self, buf: &mut [u8]) -> Outcome<usize> {
        let n = buf.len().min(self.data.len());
        for (dst, src) in buf.iter_mut().zip(self.data.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Outcome<usize> {
        self.data.extend(buf);
        Ok(buf.len())
    }
}

pub(super) struct FileBackend {
    path: PathBuf,
    file: Option<fs::File>,
}

impl FileBackend {
    pub(super) fn new(path: PathBuf) -> Self {
        FileBackend { path, file: None }
    }

    fn file(&mut self) -> Outcome<&mut fs::File> {
        self.file.as_mut().ok_or_else(|| Code::NotOpen.into())
    }
}

/// The permission bits for a newly created file.
fn creation_mode(flags: StreamFlags) -> u32 {
    let mut mode = 0o600;
    if flags.contains(StreamFlags::IRGRP) {
        mode |= 0o040;
    }
    if flags.contains(StreamFlags::IWGRP) {
        mode |= 0o020;
    }
    if flags.contains(StreamFlags::IROTH) {
        mode |= 0o004;
    }
    if flags.contains(StreamFlags::IWOTH) {
        mode |= 0o002;
    }
    mode
}

impl Backend for FileBackend {
    fn open(&mut self, flags: StreamFlags) -> Outcome<()> {
        let file = fs::OpenOptions::new()
            .read(flags.readable())
            .write(flags.intersects(StreamFlags::WRITE | StreamFlags::RDWR))
            .append(flags.contains(StreamFlags::APPEND))
            .create(flags.contains(StreamFlags::CREAT))
            .mode(creation_mode(flags))
            .open(&self.path)
            .map_err(io_status)?;
        debug!("Opened {}", self.path.display());
        self.file = Some(file);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Outcome<usize> {
        self.file()?.read(buf).map_err(io_status)
    }

    fn write(&mut self, buf: &[u8]) -> Outcome<usize> {
        self.file()?.write(buf).map_err(io_status)
    }

    fn flush(&mut self) -> Outcome<()> {
        self.file()?.flush().map_err(io_status)
    }

    fn close(&mut self) -> Outcome<()> {
        if let Some(file) = self.file.take() {
            file.sync_data().map_err(io_status)?;
        }
        Ok(())
    }

    fn wait(&mut self, flags: WaitFlags) -> Outcome<WaitFlags> {
        poll_fd(self.file()?.as_raw_fd(), flags)
    }
}

pub(super) struct TcpBackend {
    host: String,
    port: u16,
    socket: Option<TcpStream>,
}

impl TcpBackend {
    pub(super) fn new(host: &str, port: u16) -> Self {
        TcpBackend {
            host: host.to_owned(),
            port,
            socket: None,
        }
    }

    fn socket(&mut self) -> Outcome<&mut TcpStream> {
        self.socket.as_mut().ok_or_else(|| Code::NotOpen.into())
    }
}

impl Backend for TcpBackend {
    fn open(&mut self, flags: StreamFlags) -> Outcome<()> {
        if self.host.is_empty() {
            return Err(Code::TcpNoHost.into());
        }
        if 0 == self.port {
            return Err(Code::TcpNoPort.into());
        }

        let socket = TcpStream::connect((&self.host[..], self.port))
            .map_err(|e| match e.raw_os_error() {
                Some(_) => io_status(e),
                None => Code::GetHostByName.into(),
            })?;
        if flags.contains(StreamFlags::NONBLOCK) {
            socket.set_nonblocking(true).map_err(io_status)?;
        }
        debug!("Connected to {}:{}", self.host, self.port);
        self.socket = Some(socket);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Outcome<usize> {
        self.socket()?.read(buf).map_err(io_status)
    }

    fn write(&mut self, buf: &[u8]) -> Outcome<usize> {
        self.socket()?.write(buf).map_err(io_status)
    }

    fn flush(&mut self) -> Outcome<()> {
        self.socket()?.flush().map_err(io_status)
    }

    fn close(&mut self) -> Outcome<()> {
        self.socket = None;
        Ok(())
    }

    fn wait(&mut self, flags: WaitFlags) -> Outcome<WaitFlags> {
        poll_fd(self.socket()?.as_raw_fd(), flags)
    }
}

/// One of the process's standard descriptors.
pub(super) struct StdioBackend {
    fd: RawFd,
}

impl StdioBackend {
    pub(super) fn new(fd: RawFd) -> Outcome<Self> {
        if (0..=2).contains(&fd) {
            Ok(StdioBackend { fd })
        } else {
            Err(Errno::EBADF.into())
        }
    }
}

impl Backend for StdioBackend {
    fn read(&mut self, buf: &mut [u8]) -> Outcome<usize> {
        match self.fd {
            0 => io::stdin().lock().read(buf).map_err(io_status),
            _ => Err(Errno::EBADF.into()),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Outcome<usize> {
        match self.fd {
            1 => io::stdout().lock().write(buf).map_err(io_status),
            2 => io::stderr().lock().write(buf).map_err(io_status),
            _ => Err(Errno::EBADF.into()),
        }
    }

    fn flush(&mut self) -> Outcome<()> {
        match self.fd {
            1 => io::stdout().flush().map_err(io_status),
            2 => io::stderr().flush().map_err(io_status),
            _ => Ok(()),
        }
    }

    fn wait(&mut self, flags: WaitFlags) -> Outcome<WaitFlags> {
        poll_fd(self.fd, flags)
    }
}

fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

pub(super) fn spawn(mut cmd: Command) -> Outcome<Child> {
    cmd.spawn().map_err(|e| {
        warn!("Cannot execute {:?}: {}", cmd, e);
        Status::from(Code::ProcessNoExec)
    })
}

/// Translates how a child process ended.
pub(super) fn exit_status(status: ExitStatus) -> Outcome<()> {
    if status.success() {
        Ok(())
    } else if status.signal().is_some() {
        Err(Code::ProcessSignaled.into())
    } else if status.code().is_some() {
        Err(Code::ProcessExited.into())
    } else {
        Err(Code::ProcessUnknownFailure.into())
    }
}

fn reap(child: &mut Child) {
    if let Ok(None) = child.try_wait() {
        let _ = child.kill();
        let _ = child.wait();
    }
}

/// A shell command whose output is read, or whose input is written.
pub(super) struct ProgramBackend {
    command: String,
    child: Option<Child>,
}

impl ProgramBackend {
    pub(super) fn new(command: &str) -> Self {
        ProgramBackend {
            command: command.to_owned(),
            child: None,
        }
    }

    fn child(&mut self) -> Outcome<&mut Child> {
        self.child.as_mut().ok_or_else(|| Code::NotOpen.into())
    }
}

impl Backend for ProgramBackend {
    fn open(&mut self, flags: StreamFlags) -> Outcome<()> {
        let mut cmd = shell(&self.command);
        cmd.stdin(if flags.writable() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(if flags.readable() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        self.child = Some(spawn(cmd)?);
        debug!("Started {:?}", self.command);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Outcome<usize> {
        match self.child()?.stdout {
            Some(ref mut stdout) => stdout.read(buf).map_err(io_status),
            None => Err(Errno::EBADF.into()),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Outcome<usize> {
        match self.child()?.stdin {
            Some(ref mut stdin) => stdin.write(buf).map_err(io_status),
            None => Err(Errno::EBADF.into()),
        }
    }

    fn close(&mut self) -> Outcome<()> {
        let mut child = match self.child.take() {
            Some(child) => child,
            None => return Ok(()),
        };
        drop(child.stdin.take());
        if let Some(mut stdout) = child.stdout.take() {
            // Let the command finish writing rather than die of SIGPIPE
            let _ = io::copy(&mut stdout, &mut io::sink());
        }
        exit_status(child.wait().map_err(io_status)?)
    }
}

impl Drop for ProgramBackend {
    fn drop(&mut self) {
        if let Some(ref mut child) = self.child {
            reap(child);
        }
    }
}

/// A shell command whose input is copied from another stream, and whose
/// output is read.
pub(super) struct FilterProgramBackend {
    command: String,
    input: Arc<Mutex<StreamObj>>,
    child: Option<Child>,
    pump: Option<thread::JoinHandle<Outcome<()>>>,
}

impl FilterProgramBackend {
    pub(super) fn new(command: &str, input: Arc<Mutex<StreamObj>>) -> Self {
        FilterProgramBackend {
            command: command.to_owned(),
            input,
            child: None,
            pump: None,
        }
    }
}

fn pump(input: Arc<Mutex<StreamObj>>, mut stdin: ChildStdin) -> Outcome<()> {
    let mut buf = vec![0u8; 4096];
    loop {
        let n = lock(&input).read(&mut buf)?;
        if 0 == n {
            return Ok(());
        }
        match stdin.write_all(&buf[..n]) {
            Ok(()) => (),
            // The command stopped reading; whatever it wrote is still valid
            Err(ref e) if io::ErrorKind::BrokenPipe == e.kind() => {
                return Ok(())
            }
            Err(e) => return Err(io_status(e)),
        }
    }
}

impl Backend for FilterProgramBackend {
    fn open(&mut self, _flags: StreamFlags) -> Outcome<()> {
        let mut cmd = shell(&self.command);
        cmd.stdin(Stdio::piped()).stdout(Stdio::piped());
        let mut child = spawn(cmd)?;

        if let Some(stdin) = child.stdin.take() {
            let input = Arc::clone(&self.input);
            self.pump = Some(thread::spawn(move || pump(input, stdin)));
        }
        self.child = Some(child);
        debug!("Started filter {:?}", self.command);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Outcome<usize> {
        match self.child.as_mut().and_then(|c| c.stdout.as_mut()) {
            Some(stdout) => stdout.read(buf).map_err(io_status),
            None => Err(Code::NotOpen.into()),
        }
    }

    fn write(&mut self, _buf: &[u8]) -> Outcome<usize> {
        Err(Errno::EBADF.into())
    }

    fn close(&mut self) -> Outcome<()> {
        let mut child = match self.child.take() {
            Some(child) => child,
            None => return Ok(()),
        };
        if let Some(mut stdout) = child.stdout.take() {
            let _ = io::copy(&mut stdout, &mut io::sink());
        }
        let status = child.wait().map_err(io_status)?;

        if let Some(pump) = self.pump.take() {
            pump.join().map_err(|_| Status::from(Code::Failure))??;
        }
        exit_status(status)
    }
}

impl Drop for FilterProgramBackend {
    fn drop(&mut self) {
        if let Some(ref mut child) = self.child {
            reap(child);
        }
        // The pump ends by itself once the child's input pipe is closed
        drop(self.pump.take());
    }
}
