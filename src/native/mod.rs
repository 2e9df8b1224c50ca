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

//! The native call boundary.
//!
//! Each method of `Engine` corresponds to exactly one call into the
//! mail-processing engine. Calls either succeed with their result or fail with
//! the engine's nonzero `Status`; translating that status into an `Error` is
//! the caller's job (see `support::error::ResultExt`).
//!
//! Every call has a default implementation which fails with
//! `MU_ERR_EMPTY_VFN`, so an engine only needs to provide what it supports.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use log::info;

use crate::attribute::Flags;
use crate::filter::FallbackMode;
use crate::sieve::SieveAction;
use crate::stream::{StreamFlags, WaitFlags};
use crate::support::config::Config;
use crate::support::error::{Error, Result};
use crate::support::loader;
use crate::support::status::{Code, Status};

pub mod local;

/// The result of a single native call.
pub type Outcome<T> = std::result::Result<T, Status>;

/// A shared reference to an engine.
pub type EngineRef = Arc<dyn Engine>;

/// Callback invoked by a sieve machine for every action it takes.
pub type SieveLogger = Box<dyn FnMut(&SieveAction) + Send>;

/// An opaque identifier for a resource owned by the engine.
///
/// The value is never interpreted outside the engine that issued it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RawHandle(u64);

impl RawHandle {
    pub fn from_raw(raw: u64) -> Self {
        RawHandle(raw)
    }

    pub fn into_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The type of resource a `RawHandle` refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Stream,
    Message,
    Attribute,
    Mailbox,
    Folder,
    Url,
    Debug,
    Address,
    Mailer,
    SieveMachine,
    Mailcap,
    MailcapEntry,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            HandleKind::Stream => "stream",
            HandleKind::Message => "message",
            HandleKind::Attribute => "attribute",
            HandleKind::Mailbox => "mailbox",
            HandleKind::Folder => "folder",
            HandleKind::Url => "url",
            HandleKind::Debug => "debug",
            HandleKind::Address => "address",
            HandleKind::Mailer => "mailer",
            HandleKind::SieveMachine => "sieve machine",
            HandleKind::Mailcap => "mailcap",
            HandleKind::MailcapEntry => "mailcap entry",
        };
        f.write_str(name)
    }
}

/// Where the bytes of a new stream come from.
#[derive(Clone, Copy, Debug)]
pub enum StreamSource<'a> {
    File(&'a Path),
    Tcp { host: &'a str, port: u16 },
    /// One of the standard descriptors 0, 1 or 2.
    Stdio(i32),
    /// A memory stream, pre-filled and positioned at the start.
    Memory(&'a [u8]),
    /// A shell command; the stream reads its output or writes its input.
    Program(&'a str),
    /// A shell command reading its input from another stream.
    FilterProgram { command: &'a str, input: RawHandle },
}

fn unsupported<T>() -> Outcome<T> {
    Err(Code::EmptyVfn.into())
}

/// The narrow call interface of a mail-processing engine.
///
/// Handles passed in must have been issued by the same engine. Methods
/// documented as returning a *borrowed* handle return a resource owned by
/// another one; such handles must never be passed to `destroy()`.
#[allow(unused_variables)]
pub trait Engine: Send + Sync {
    /// Releases a resource. Called at most once per owned handle.
    fn destroy(&self, kind: HandleKind, handle: RawHandle);

    fn stream_create(
        &self,
        source: StreamSource<'_>,
        flags: StreamFlags,
    ) -> Outcome<RawHandle> {
        unsupported()
    }

    /// Creates a stream converting the bytes of `upstream` between character
    /// sets. The engine keeps its own reference to `upstream`.
    fn iconv_stream_create(
        &self,
        upstream: RawHandle,
        from: &str,
        to: &str,
        fallback: FallbackMode,
        flags: StreamFlags,
    ) -> Outcome<RawHandle> {
        unsupported()
    }

    fn stream_open(&self, stream: RawHandle) -> Outcome<()> {
        unsupported()
    }

    fn stream_close(&self, stream: RawHandle) -> Outcome<()> {
        unsupported()
    }

    fn stream_flush(&self, stream: RawHandle) -> Outcome<()> {
        unsupported()
    }

    /// Blocks until the stream is ready for one of `flags`, returning the
    /// conditions that are.
    fn stream_wait(
        &self,
        stream: RawHandle,
        flags: WaitFlags,
    ) -> Outcome<WaitFlags> {
        unsupported()
    }

    /// Reads the next chunk into `buf`. Zero means end of stream.
    fn stream_read(&self, stream: RawHandle, buf: &mut [u8]) -> Outcome<usize> {
        unsupported()
    }

    /// Like `stream_read()`, but stops after the first line terminator.
    fn stream_readline(
        &self,
        stream: RawHandle,
        buf: &mut [u8],
    ) -> Outcome<usize> {
        unsupported()
    }

    /// Writes some prefix of `buf`, returning its length.
    fn stream_write(&self, stream: RawHandle, buf: &[u8]) -> Outcome<usize> {
        unsupported()
    }

    /// Creates a new (owned) message from the remaining content of `stream`.
    fn stream_to_message(&self, stream: RawHandle) -> Outcome<RawHandle> {
        unsupported()
    }

    fn message_size(&self, msg: RawHandle) -> Outcome<usize> {
        unsupported()
    }

    fn message_lines(&self, msg: RawHandle) -> Outcome<usize> {
        unsupported()
    }

    /// Returns the (borrowed) attribute of `msg`.
    fn message_attribute(&self, msg: RawHandle) -> Outcome<RawHandle> {
        unsupported()
    }

    /// Returns a new (owned) stream over the raw message.
    fn message_stream(&self, msg: RawHandle) -> Outcome<RawHandle> {
        unsupported()
    }

    fn message_header_value(
        &self,
        msg: RawHandle,
        name: &str,
    ) -> Outcome<String> {
        unsupported()
    }

    fn attribute_flags(&self, attr: RawHandle) -> Outcome<Flags> {
        unsupported()
    }

    fn attribute_set_flags(
        &self,
        attr: RawHandle,
        flags: Flags,
    ) -> Outcome<()> {
        unsupported()
    }

    fn attribute_unset_flags(
        &self,
        attr: RawHandle,
        flags: Flags,
    ) -> Outcome<()> {
        unsupported()
    }

    fn attribute_is_modified(&self, attr: RawHandle) -> Outcome<bool> {
        unsupported()
    }

    fn attribute_set_modified(&self, attr: RawHandle) -> Outcome<()> {
        unsupported()
    }

    fn attribute_clear_modified(&self, attr: RawHandle) -> Outcome<()> {
        unsupported()
    }

    fn mailbox_create(&self, url: &str) -> Outcome<RawHandle> {
        unsupported()
    }

    /// Creates the mailbox the engine considers the default for `name`, or
    /// the overall default if `name` is `None`.
    fn mailbox_create_default(&self, name: Option<&str>) -> Outcome<RawHandle> {
        unsupported()
    }

    fn mailbox_open(&self, mbox: RawHandle, flags: StreamFlags) -> Outcome<()> {
        unsupported()
    }

    fn mailbox_close(&self, mbox: RawHandle) -> Outcome<()> {
        unsupported()
    }

    fn mailbox_flush(&self, mbox: RawHandle, expunge: bool) -> Outcome<()> {
        unsupported()
    }

    fn mailbox_messages_count(&self, mbox: RawHandle) -> Outcome<usize> {
        unsupported()
    }

    fn mailbox_messages_recent(&self, mbox: RawHandle) -> Outcome<usize> {
        unsupported()
    }

    fn mailbox_message_unseen(&self, mbox: RawHandle) -> Outcome<usize> {
        unsupported()
    }

    /// Returns the (borrowed) message numbered `msgno`, counting from 1.
    fn mailbox_get_message(
        &self,
        mbox: RawHandle,
        msgno: usize,
    ) -> Outcome<RawHandle> {
        unsupported()
    }

    fn mailbox_append_message(
        &self,
        mbox: RawHandle,
        msg: RawHandle,
    ) -> Outcome<()> {
        unsupported()
    }

    fn mailbox_expunge(&self, mbox: RawHandle) -> Outcome<()> {
        unsupported()
    }

    fn mailbox_sync(&self, mbox: RawHandle) -> Outcome<()> {
        unsupported()
    }

    fn mailbox_lock(&self, mbox: RawHandle) -> Outcome<()> {
        unsupported()
    }

    fn mailbox_unlock(&self, mbox: RawHandle) -> Outcome<()> {
        unsupported()
    }

    fn mailbox_size(&self, mbox: RawHandle) -> Outcome<u64> {
        unsupported()
    }

    /// Returns the (borrowed) folder containing the mailbox.
    fn mailbox_folder(&self, mbox: RawHandle) -> Outcome<RawHandle> {
        unsupported()
    }

    /// Returns the (borrowed) URL of the mailbox.
    fn mailbox_url(&self, mbox: RawHandle) -> Outcome<RawHandle> {
        unsupported()
    }

    /// Returns the (borrowed) debug object of the mailbox.
    fn mailbox_debug(&self, mbox: RawHandle) -> Outcome<RawHandle> {
        unsupported()
    }

    fn folder_name(&self, folder: RawHandle) -> Outcome<String> {
        unsupported()
    }

    fn url_string(&self, url: RawHandle) -> Outcome<String> {
        unsupported()
    }

    fn url_scheme(&self, url: RawHandle) -> Outcome<String> {
        unsupported()
    }

    fn url_path(&self, url: RawHandle) -> Outcome<String> {
        unsupported()
    }

    fn debug_level(&self, debug: RawHandle) -> Outcome<u32> {
        unsupported()
    }

    fn debug_set_level(&self, debug: RawHandle, level: u32) -> Outcome<()> {
        unsupported()
    }

    /// Parses a comma-separated address list.
    fn address_create(&self, text: &str) -> Outcome<RawHandle> {
        unsupported()
    }

    fn address_count(&self, addr: RawHandle) -> Outcome<usize> {
        unsupported()
    }

    /// Returns the email part of address number `no`, counting from 1.
    fn address_email(&self, addr: RawHandle, no: usize) -> Outcome<String> {
        unsupported()
    }

    fn address_to_string(&self, addr: RawHandle) -> Outcome<String> {
        unsupported()
    }

    fn mailer_create(&self, url: &str) -> Outcome<RawHandle> {
        unsupported()
    }

    fn mailer_open(
        &self,
        mailer: RawHandle,
        flags: StreamFlags,
    ) -> Outcome<()> {
        unsupported()
    }

    fn mailer_close(&self, mailer: RawHandle) -> Outcome<()> {
        unsupported()
    }

    fn mailer_send_message(
        &self,
        mailer: RawHandle,
        msg: RawHandle,
        from: Option<RawHandle>,
        to: Option<RawHandle>,
    ) -> Outcome<()> {
        unsupported()
    }

    fn sieve_machine_init(&self) -> Outcome<RawHandle> {
        unsupported()
    }

    fn sieve_compile(&self, mach: RawHandle, script: &Path) -> Outcome<()> {
        unsupported()
    }

    fn sieve_disass(&self, mach: RawHandle) -> Outcome<String> {
        unsupported()
    }

    fn sieve_message(&self, mach: RawHandle, msg: RawHandle) -> Outcome<()> {
        unsupported()
    }

    fn sieve_mailbox(&self, mach: RawHandle, mbox: RawHandle) -> Outcome<()> {
        unsupported()
    }

    /// Returns and clears the machine's accumulated diagnostic text.
    fn sieve_error_text(&self, mach: RawHandle) -> Outcome<String> {
        unsupported()
    }

    fn sieve_set_logger(
        &self,
        mach: RawHandle,
        logger: SieveLogger,
    ) -> Outcome<()> {
        unsupported()
    }

    /// Parses a mailcap file from the remaining content of `stream`.
    fn mailcap_create(&self, stream: RawHandle) -> Outcome<RawHandle> {
        unsupported()
    }

    fn mailcap_entries_count(&self, mailcap: RawHandle) -> Outcome<usize> {
        unsupported()
    }

    /// Returns the (borrowed) entry numbered `no`, counting from 1.
    fn mailcap_get_entry(
        &self,
        mailcap: RawHandle,
        no: usize,
    ) -> Outcome<RawHandle> {
        unsupported()
    }

    fn mailcap_entry_fields_count(&self, entry: RawHandle) -> Outcome<usize> {
        unsupported()
    }

    /// Returns field number `no` of the entry, counting from 1. Field 1 is
    /// the content type and field 2 the view command.
    fn mailcap_entry_get_field(
        &self,
        entry: RawHandle,
        no: usize,
    ) -> Outcome<String> {
        unsupported()
    }
}

/// Returns the engine selected by `config`.
///
/// This build links no dynamically loaded engines. A configured library is
/// still resolved, so that a broken installation is reported precisely, but
/// is then refused.
pub fn connect(config: &Config) -> Result<EngineRef> {
    match config.engine.library {
        None => {
            info!("Using the built-in local engine");
            Ok(Arc::new(local::LocalEngine::new(config)))
        }
        Some(ref logical) => {
            let path = loader::resolve(logical)?;
            Err(Error::Library {
                path,
                reason: "dynamically loaded engines are not supported by \
                         this build"
                    .to_owned(),
            })
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    struct Nothing;

    impl Engine for Nothing {
        fn destroy(&self, _: HandleKind, _: RawHandle) {}
    }

    #[test]
    fn unimplemented_calls_report_empty_vfn() {
        let engine = Nothing;
        assert_eq!(
            Err(Status::from(Code::EmptyVfn)),
            engine.stream_open(RawHandle::from_raw(1))
        );
        assert_eq!(
            Err(Status::from(Code::EmptyVfn)),
            engine.mailbox_messages_count(RawHandle::from_raw(1))
        );
    }

    #[test]
    fn connect_defaults_to_local_engine() {
        assert!(connect(&Config::default()).is_ok());
    }

    #[test]
    fn connect_rejects_missing_library() {
        let mut config = Config::default();
        config.engine.library = Some("/nonexistent/dir/c_api".into());
        assert!(matches!(connect(&config), Err(Error::Library { .. })));
    }
}
