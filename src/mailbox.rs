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

//! Mailboxes and the handles derived from them.
//!
//! Messages are numbered from 1. `Mailbox::messages()` walks them in order,
//! bounded by the message count as it was when the walk started: messages
//! appended during the walk are not visited, and each call starts a fresh,
//! independent walk.

use log::debug;

use crate::handle::Handle;
use crate::message::Message;
use crate::native::{EngineRef, HandleKind, RawHandle};
use crate::stream::StreamFlags;
use crate::support::error::{Result, ResultExt, Subsystem};
use crate::support::snapshot::Snapshot;

/// A mailbox held by the engine.
#[derive(Clone, Debug)]
pub struct Mailbox {
    handle: Handle,
}

impl Mailbox {
    /// Creates (but does not open) the mailbox at `url`.
    pub fn new(engine: &EngineRef, url: &str) -> Result<Self> {
        let raw = engine.mailbox_create(url).or_fail(Subsystem::Mailbox)?;
        Ok(Mailbox::from_handle(Handle::acquire(
            engine,
            HandleKind::Mailbox,
            raw,
        )))
    }

    /// Creates (but does not open) the default mailbox named `name`, or the
    /// default mailbox overall.
    pub fn default_for(engine: &EngineRef, name: Option<&str>) -> Result<Self> {
        let raw = engine
            .mailbox_create_default(name)
            .or_fail(Subsystem::Mailbox)?;
        Ok(Mailbox::from_handle(Handle::acquire(
            engine,
            HandleKind::Mailbox,
            raw,
        )))
    }

    /// Wraps a mailbox handle owned elsewhere.
    ///
    /// The mailbox is never destroyed through this wrapper. If `parent` is
    /// given, it is kept alive as long as the wrapper is.
    pub fn borrowed(
        engine: &EngineRef,
        raw: RawHandle,
        parent: Option<&Handle>,
    ) -> Self {
        Mailbox::from_handle(Handle::borrow(
            engine,
            HandleKind::Mailbox,
            raw,
            parent,
        ))
    }

    pub fn from_handle(handle: Handle) -> Self {
        debug_assert_eq!(HandleKind::Mailbox, handle.kind());
        Mailbox { handle }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn open(&self, flags: StreamFlags) -> Result<()> {
        debug!("Opening {:?} with {:?}", self.handle, flags);
        self.handle
            .engine()
            .mailbox_open(self.handle.raw()?, flags)
            .or_fail(Subsystem::Mailbox)
    }

    pub fn close(&self) -> Result<()> {
        debug!("Closing {:?}", self.handle);
        self.handle
            .engine()
            .mailbox_close(self.handle.raw()?)
            .or_fail(Subsystem::Mailbox)
    }

    /// Writes pending changes out, first expunging if `expunge` is set.
    pub fn flush(&self, expunge: bool) -> Result<()> {
        self.handle
            .engine()
            .mailbox_flush(self.handle.raw()?, expunge)
            .or_fail(Subsystem::Mailbox)
    }

    pub fn messages_count(&self) -> Result<usize> {
        self.handle
            .engine()
            .mailbox_messages_count(self.handle.raw()?)
            .or_fail(Subsystem::Mailbox)
    }

    /// The number of messages that are neither seen nor read.
    pub fn messages_recent(&self) -> Result<usize> {
        self.handle
            .engine()
            .mailbox_messages_recent(self.handle.raw()?)
            .or_fail(Subsystem::Mailbox)
    }

    /// The number of the first unseen message, or 0 if all have been seen.
    pub fn message_unseen(&self) -> Result<usize> {
        self.handle
            .engine()
            .mailbox_message_unseen(self.handle.raw()?)
            .or_fail(Subsystem::Mailbox)
    }

    /// Returns message number `msgno`, counting from 1.
    ///
    /// Numbers outside `1..=messages_count()` fail with `MU_ERR_NOENT`.
    pub fn get_message(&self, msgno: usize) -> Result<Message> {
        let raw = self
            .handle
            .engine()
            .mailbox_get_message(self.handle.raw()?, msgno)
            .or_fail(Subsystem::Mailbox)?;
        Ok(Message::from_handle(Handle::borrow(
            self.handle.engine_ref(),
            HandleKind::Message,
            raw,
            Some(&self.handle),
        )))
    }

    /// Appends a copy of `message`.
    pub fn append_message(&self, message: &Message) -> Result<()> {
        self.handle
            .engine()
            .mailbox_append_message(self.handle.raw()?, message.handle().raw()?)
            .or_fail(Subsystem::Mailbox)
    }

    /// Permanently removes every message flagged as deleted.
    ///
    /// Messages previously obtained for the removed entries become unusable.
    pub fn expunge(&self) -> Result<()> {
        debug!("Expunging {:?}", self.handle);
        self.handle
            .engine()
            .mailbox_expunge(self.handle.raw()?)
            .or_fail(Subsystem::Mailbox)
    }

    pub fn sync(&self) -> Result<()> {
        self.handle
            .engine()
            .mailbox_sync(self.handle.raw()?)
            .or_fail(Subsystem::Mailbox)
    }

    /// Takes the mailbox's advisory lock.
    ///
    /// The lock is not reentrant: taking it again before `unlock()` fails
    /// with `MU_ERR_LOCK_CONFLICT`.
    pub fn lock(&self) -> Result<()> {
        debug!("Locking {:?}", self.handle);
        self.handle
            .engine()
            .mailbox_lock(self.handle.raw()?)
            .or_fail(Subsystem::Mailbox)
    }

    pub fn unlock(&self) -> Result<()> {
        debug!("Unlocking {:?}", self.handle);
        self.handle
            .engine()
            .mailbox_unlock(self.handle.raw()?)
            .or_fail(Subsystem::Mailbox)
    }

    /// The total size of the mailbox in bytes.
    pub fn size(&self) -> Result<u64> {
        self.handle
            .engine()
            .mailbox_size(self.handle.raw()?)
            .or_fail(Subsystem::Mailbox)
    }

    pub fn folder(&self) -> Result<Folder> {
        let raw = self
            .handle
            .engine()
            .mailbox_folder(self.handle.raw()?)
            .or_fail(Subsystem::Mailbox)?;
        Ok(Folder {
            handle: self.derived(HandleKind::Folder, raw),
        })
    }

    pub fn url(&self) -> Result<Url> {
        let raw = self
            .handle
            .engine()
            .mailbox_url(self.handle.raw()?)
            .or_fail(Subsystem::Mailbox)?;
        Ok(Url {
            handle: self.derived(HandleKind::Url, raw),
        })
    }

    pub fn debug(&self) -> Result<Debug> {
        let raw = self
            .handle
            .engine()
            .mailbox_debug(self.handle.raw()?)
            .or_fail(Subsystem::Mailbox)?;
        Ok(Debug {
            handle: self.derived(HandleKind::Debug, raw),
        })
    }

    fn derived(&self, kind: HandleKind, raw: RawHandle) -> Handle {
        Handle::borrow(self.handle.engine_ref(), kind, raw, Some(&self.handle))
    }

    /// Starts a walk over the messages currently in the mailbox.
    pub fn messages(&self) -> Messages<'_> {
        Snapshot::new(self, self.messages_count(), Mailbox::get_message)
    }

    /// Tears the mailbox down immediately, on behalf of every clone.
    pub fn dispose(&self) -> Result<()> {
        self.handle.dispose()
    }
}

impl<'a> IntoIterator for &'a Mailbox {
    type Item = Result<Message>;
    type IntoIter = Messages<'a>;

    fn into_iter(self) -> Messages<'a> {
        self.messages()
    }
}

/// A walk over the messages present when the walk started.
pub type Messages<'a> = Snapshot<'a, Mailbox, Message>;

/// The folder a mailbox lives in.
#[derive(Clone, Debug)]
pub struct Folder {
    handle: Handle,
}

impl Folder {
    pub fn name(&self) -> Result<String> {
        self.handle
            .engine()
            .folder_name(self.handle.raw()?)
            .or_fail(Subsystem::Folder)
    }
}

/// The parsed URL of a mailbox.
#[derive(Clone, Debug)]
pub struct Url {
    handle: Handle,
}

impl Url {
    /// The URL as a whole.
    pub fn to_text(&self) -> Result<String> {
        self.handle
            .engine()
            .url_string(self.handle.raw()?)
            .or_fail(Subsystem::Url)
    }

    pub fn scheme(&self) -> Result<String> {
        self.handle
            .engine()
            .url_scheme(self.handle.raw()?)
            .or_fail(Subsystem::Url)
    }

    pub fn path(&self) -> Result<String> {
        self.handle
            .engine()
            .url_path(self.handle.raw()?)
            .or_fail(Subsystem::Url)
    }
}

/// The diagnostic verbosity of a mailbox.
#[derive(Clone, Debug)]
pub struct Debug {
    handle: Handle,
}

impl Debug {
    pub fn level(&self) -> Result<u32> {
        self.handle
            .engine()
            .debug_level(self.handle.raw()?)
            .or_fail(Subsystem::Debug)
    }

    pub fn set_level(&self, level: u32) -> Result<()> {
        self.handle
            .engine()
            .debug_set_level(self.handle.raw()?, level)
            .or_fail(Subsystem::Debug)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::attribute::Flags;
    use crate::native::local;
    use crate::stream::Stream;
    use crate::support::error::Error;
    use crate::support::status::Code;

    fn message(engine: &EngineRef, subject: &str) -> Message {
        Stream::memory(
            engine,
            format!("From: a@example.com\nSubject: {}\n\nbody\n", subject)
                .as_bytes(),
        )
        .unwrap()
        .to_message()
        .unwrap()
    }

    fn mailbox_with(engine: &EngineRef, url: &str, n: usize) -> Mailbox {
        let mailbox = Mailbox::new(engine, url).unwrap();
        mailbox.open(StreamFlags::RDWR).unwrap();
        for i in 1..=n {
            mailbox
                .append_message(&message(engine, &format!("m{}", i)))
                .unwrap();
        }
        mailbox
    }

    fn subjects(mailbox: &Mailbox) -> Vec<String> {
        mailbox
            .messages()
            .map(|m| m.unwrap().header_value("Subject").unwrap())
            .collect()
    }

    #[test]
    fn iterates_in_order() {
        let engine = local::test_engine();
        let mailbox = mailbox_with(&engine, "memory:iterate", 3);
        assert_eq!(vec!["m1", "m2", "m3"], subjects(&mailbox));
        assert_eq!(3, mailbox.messages().len());
        // A second walk starts over
        assert_eq!(vec!["m1", "m2", "m3"], subjects(&mailbox));

        let mut n = 0;
        for message in &mailbox {
            message.unwrap();
            n += 1;
        }
        assert_eq!(3, n);
    }

    #[test]
    fn empty_mailbox_iterates_nothing() {
        let engine = local::test_engine();
        let mailbox = mailbox_with(&engine, "memory:empty", 0);
        assert_eq!(0, mailbox.messages().count());
    }

    #[test]
    fn walk_is_bounded_by_snapshot() {
        let engine = local::test_engine();
        let mailbox = mailbox_with(&engine, "memory:snapshot", 2);

        let mut seen = 0;
        for walked in mailbox.messages() {
            walked.unwrap();
            seen += 1;
            mailbox.append_message(&message(&engine, "late")).unwrap();
        }
        assert_eq!(2, seen);
        assert_eq!(4, mailbox.messages_count().unwrap());
    }

    #[test]
    fn walk_over_unopened_mailbox_yields_error_once() {
        let engine = local::test_engine();
        let mailbox = Mailbox::new(&engine, "memory:unopened").unwrap();
        let mut walk = mailbox.messages();
        assert!(walk.next().unwrap().unwrap_err().is(Code::NotOpen));
        assert!(walk.next().is_none());
    }

    #[test]
    fn get_message_bounds() {
        let engine = local::test_engine();
        let mailbox = mailbox_with(&engine, "memory:bounds", 3);
        for &msgno in &[0, 4] {
            let err = mailbox.get_message(msgno).unwrap_err();
            assert_matches!(Error::Mailbox(_), &err);
            assert!(err.is(Code::NoEnt));
        }
        assert!(mailbox.get_message(3).is_ok());
    }

    #[test]
    fn expunge_removes_deleted() {
        let engine = local::test_engine();
        let mailbox = mailbox_with(&engine, "memory:expunge", 3);
        let doomed = mailbox.get_message(2).unwrap();
        doomed.attribute().unwrap().set_flags(Flags::DELETED).unwrap();

        mailbox.expunge().unwrap();
        assert_eq!(2, mailbox.messages_count().unwrap());
        assert_eq!(vec!["m1", "m3"], subjects(&mailbox));
        assert!(doomed.size().is_err());
    }

    #[test]
    fn flush_with_expunge() {
        let engine = local::test_engine();
        let mailbox = mailbox_with(&engine, "memory:flush", 2);
        let attr = mailbox.get_message(1).unwrap().attribute().unwrap();
        attr.set_flags(Flags::DELETED).unwrap();
        attr.set_modified().unwrap();

        mailbox.flush(false).unwrap();
        assert_eq!(2, mailbox.messages_count().unwrap());
        assert!(!attr.is_modified().unwrap());

        mailbox.flush(true).unwrap();
        assert_eq!(1, mailbox.messages_count().unwrap());
    }

    #[test]
    fn sync_clears_modified() {
        let engine = local::test_engine();
        let mailbox = mailbox_with(&engine, "memory:sync", 1);
        let attr = mailbox.get_message(1).unwrap().attribute().unwrap();
        attr.set_modified().unwrap();
        mailbox.sync().unwrap();
        assert!(!attr.is_modified().unwrap());
    }

    #[test]
    fn recent_and_unseen() {
        let engine = local::test_engine();
        let mailbox = mailbox_with(&engine, "memory:recent", 3);
        assert_eq!(3, mailbox.messages_recent().unwrap());
        assert_eq!(1, mailbox.message_unseen().unwrap());

        let attr = mailbox.get_message(1).unwrap().attribute().unwrap();
        attr.set_flags(Flags::SEEN).unwrap();
        mailbox
            .get_message(2)
            .unwrap()
            .attribute()
            .unwrap()
            .set_flags(Flags::READ)
            .unwrap();
        assert_eq!(1, mailbox.messages_recent().unwrap());
        assert_eq!(2, mailbox.message_unseen().unwrap());
    }

    #[test]
    fn lock_is_not_reentrant() {
        let engine = local::test_engine();
        let mailbox = mailbox_with(&engine, "memory:lock", 0);
        let other = Mailbox::new(&engine, "memory:lock").unwrap();
        other.open(StreamFlags::READ).unwrap();

        mailbox.lock().unwrap();
        let err = mailbox.lock().unwrap_err();
        assert!(err.is(Code::LockConflict));
        assert!(err.is_transient());
        assert!(other.lock().unwrap_err().is(Code::LockConflict));
        assert!(other.unlock().unwrap_err().is(Code::LockNotHeld));

        mailbox.unlock().unwrap();
        assert!(mailbox.unlock().unwrap_err().is(Code::LockNotHeld));
        other.lock().unwrap();
    }

    #[test]
    fn wrappers_share_one_store() {
        let engine = local::test_engine();
        let first = mailbox_with(&engine, "memory:shared", 2);
        let second = Mailbox::new(&engine, "memory:shared").unwrap();
        second.open(StreamFlags::READ).unwrap();
        assert_eq!(2, second.messages_count().unwrap());
        first.close().unwrap();
        assert!(first.messages_count().unwrap_err().is(Code::NotOpen));
        assert_eq!(2, second.messages_count().unwrap());
    }

    #[test]
    fn read_only_mailbox_refuses_changes() {
        let engine = local::test_engine();
        let mailbox = Mailbox::new(&engine, "memory:ro").unwrap();
        mailbox.open(StreamFlags::READ).unwrap();
        let err = mailbox
            .append_message(&message(&engine, "x"))
            .unwrap_err();
        assert_eq!(Some(nix::errno::Errno::EACCES.into()), err.status());
    }

    #[test]
    fn size_counts_bytes() {
        let engine = local::test_engine();
        let mailbox = mailbox_with(&engine, "memory:size", 2);
        let expected = mailbox
            .messages()
            .map(|m| m.unwrap().size().unwrap() as u64)
            .sum::<u64>();
        assert!(expected > 0);
        assert_eq!(expected, mailbox.size().unwrap());
    }

    #[test]
    fn derived_handles() {
        let engine = local::test_engine();
        let mailbox = Mailbox::new(&engine, "memory:derived").unwrap();

        let url = mailbox.url().unwrap();
        assert_eq!("memory:derived", url.to_text().unwrap());
        assert_eq!("memory", url.scheme().unwrap());
        assert_eq!("derived", url.path().unwrap());
        assert_eq!("memory", mailbox.folder().unwrap().name().unwrap());

        let debug = mailbox.debug().unwrap();
        assert_eq!(0, debug.level().unwrap());
        debug.set_level(3).unwrap();
        assert_eq!(3, mailbox.debug().unwrap().level().unwrap());

        // Derived handles keep the mailbox alive
        drop(mailbox);
        assert_eq!("derived", url.path().unwrap());
    }

    #[test]
    fn default_mailboxes() {
        let engine = local::test_engine();
        let inbox = Mailbox::default_for(&engine, None).unwrap();
        assert_eq!("memory:INBOX", inbox.url().unwrap().to_text().unwrap());
        let named = Mailbox::default_for(&engine, Some("archive")).unwrap();
        assert_eq!("memory:archive", named.url().unwrap().to_text().unwrap());
    }

    #[test]
    fn unsupported_scheme() {
        let engine = local::test_engine();
        let err =
            Mailbox::new(&engine, "imap://example.com/INBOX").unwrap_err();
        assert!(err.is(Code::NoInterface));
    }

    #[test]
    fn borrowed_mailbox_is_not_destroyed() {
        let engine = local::test_engine();
        let owner = mailbox_with(&engine, "memory:borrowed", 1);
        let borrowed = Mailbox::borrowed(
            &engine,
            owner.handle().raw().unwrap(),
            Some(owner.handle()),
        );
        drop(borrowed);
        assert_eq!(1, owner.messages_count().unwrap());
    }

    #[test]
    fn disposed_mailbox() {
        let engine = local::test_engine();
        let mailbox = mailbox_with(&engine, "memory:disposed", 1);
        let message = mailbox.get_message(1).unwrap();
        mailbox.dispose().unwrap();
        assert_matches!(
            Err(Error::Disposed(HandleKind::Mailbox)),
            mailbox.messages_count()
        );
        assert_matches!(
            Err(Error::Disposed(HandleKind::Message)),
            message.size()
        );
    }
}
