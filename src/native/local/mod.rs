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

//! An in-process engine.
//!
//! Every resource lives in one table keyed by `RawHandle`. Objects are
//! reference-counted, so a call looks its objects up, releases the table,
//! and only then locks the objects themselves; the table lock is never held
//! while another lock is taken.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, trace, warn};
use nix::errno::Errno;

use self::iconv::{Converter, IconvBackend};
use self::mail::{Addr, MailerObj, Transport};
use self::sieve::SieveObj;
use self::store::{AttrState, MailboxObj, MessageObj, Store, UrlObj};
use self::stream::{
    Backend, FileBackend, FilterProgramBackend, MemoryBackend, ProgramBackend,
    StdioBackend, StreamObj, TcpBackend,
};
use super::{
    Engine, HandleKind, Outcome, RawHandle, SieveLogger, StreamSource,
};
use crate::attribute::Flags;
use crate::filter::FallbackMode;
use crate::sieve::SieveAction;
use crate::stream::{StreamFlags, WaitFlags};
use crate::support::config::Config;
use crate::support::status::Code;

mod iconv;
mod mail;
mod mailcap;
mod sieve;
mod store;
mod stream;

pub use self::mail::SentMessage;

/// Locks `m`, ignoring poison: a panicking thread leaves objects in a
/// consistent, if unfinished, state.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone)]
enum Object {
    Stream(Arc<Mutex<StreamObj>>),
    Message(Arc<MessageObj>),
    Attribute(Arc<Mutex<AttrState>>),
    Mailbox(Arc<Mutex<MailboxObj>>),
    Folder(Arc<String>),
    Url(Arc<UrlObj>),
    Debug(Arc<AtomicU32>),
    Address(Arc<Vec<Addr>>),
    Mailer(Arc<Mutex<MailerObj>>),
    SieveMachine(Arc<Mutex<SieveObj>>),
    Mailcap(Arc<Vec<RawHandle>>),
    MailcapEntry(Arc<Vec<String>>),
}

/// The built-in engine.
///
/// Mailboxes are `memory:` URLs held for the life of the engine; mailers
/// either record what they send (see `outbox()`) or pipe it to a program.
pub struct LocalEngine {
    chunk_size: usize,
    default_url: String,
    next_handle: AtomicU64,
    objects: Mutex<HashMap<RawHandle, Object>>,
    stores: Mutex<HashMap<String, Arc<Mutex<Store>>>>,
    outbox: Mutex<Vec<SentMessage>>,
}

macro_rules! lookups {
    ($($name:ident: $variant:ident => $ty:ty;)*) => {
        impl LocalEngine {$(
            fn $name(&self, handle: RawHandle) -> Outcome<Arc<$ty>> {
                match lock(&self.objects).get(&handle) {
                    Some(&Object::$variant(ref obj)) => Ok(Arc::clone(obj)),
                    _ => Err(Errno::EINVAL.into()),
                }
            }
        )*}
    };
}

lookups! {
    stream: Stream => Mutex<StreamObj>;
    message: Message => MessageObj;
    attribute: Attribute => Mutex<AttrState>;
    mailbox: Mailbox => Mutex<MailboxObj>;
    folder: Folder => String;
    url: Url => UrlObj;
    debug: Debug => AtomicU32;
    address: Address => Vec<Addr>;
    mailer: Mailer => Mutex<MailerObj>;
    machine: SieveMachine => Mutex<SieveObj>;
    mailcap: Mailcap => Vec<RawHandle>;
    mailcap_entry: MailcapEntry => Vec<String>;
}

/// Returns element `no` of `items`, counting from 1.
fn nth<T>(items: &[T], no: usize) -> Outcome<&T> {
    no.checked_sub(1)
        .and_then(|ix| items.get(ix))
        .ok_or_else(|| Code::NoEnt.into())
}

impl LocalEngine {
    pub fn new(config: &Config) -> Self {
        LocalEngine {
            chunk_size: config.iconv.chunk_size,
            default_url: config.mailbox.default_url.clone(),
            next_handle: AtomicU64::new(1),
            objects: Mutex::new(HashMap::new()),
            stores: Mutex::new(HashMap::new()),
            outbox: Mutex::new(Vec::new()),
        }
    }

    /// Everything sent through `memory:` mailers so far.
    pub fn outbox(&self) -> Vec<SentMessage> {
        lock(&self.outbox).clone()
    }

    fn allocate(&self) -> RawHandle {
        RawHandle::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    fn insert(&self, handle: RawHandle, object: Object) {
        trace!("Created native object {:?}", handle);
        lock(&self.objects).insert(handle, object);
    }

    fn register(&self, object: Object) -> RawHandle {
        let handle = self.allocate();
        self.insert(handle, object);
        handle
    }

    /// Drops the table entries for `handles`.
    fn forget(&self, handles: &[RawHandle]) {
        let _removed = {
            let mut objects = lock(&self.objects);
            handles
                .iter()
                .filter_map(|h| objects.remove(h))
                .collect::<Vec<_>>()
        };
    }

    fn new_stream(
        &self,
        backend: Box<dyn Backend>,
        flags: StreamFlags,
    ) -> RawHandle {
        self.register(Object::Stream(Arc::new(Mutex::new(StreamObj::new(
            backend,
            flags,
            self.chunk_size,
        )))))
    }

    fn new_message(&self, content: Vec<u8>, flags: Flags) -> Arc<MessageObj> {
        let message = Arc::new(MessageObj::new(
            self.allocate(),
            self.allocate(),
            content,
            AttrState::new(flags),
        ));
        self.insert(message.id, Object::Message(Arc::clone(&message)));
        self.insert(
            message.attr_id,
            Object::Attribute(Arc::clone(&message.attr)),
        );
        message
    }

    fn new_mailbox(&self, url: UrlObj) -> RawHandle {
        let store = Arc::clone(
            lock(&self.stores)
                .entry(url.path.clone())
                .or_insert_with(Default::default),
        );
        let url = Arc::new(url);
        let debug_level = Arc::new(AtomicU32::new(0));
        let url_id = self.register(Object::Url(Arc::clone(&url)));
        let folder_id =
            self.register(Object::Folder(Arc::new(url.scheme.clone())));
        let debug_id = self.register(Object::Debug(Arc::clone(&debug_level)));

        debug!("Created mailbox {}", url.text);
        self.register(Object::Mailbox(Arc::new(Mutex::new(MailboxObj {
            url,
            store,
            open: None,
            url_id,
            folder_id,
            debug_id,
            debug_level,
        }))))
    }

    /// Runs `program` over one message, reporting actions to `logger`.
    fn judge(
        &self,
        machine: &Mutex<SieveObj>,
        program: &[sieve::Instr],
        msgno: usize,
        message: &MessageObj,
        writable: bool,
        logger: &mut Option<SieveLogger>,
    ) {
        let was_deleted = lock(&message.attr).flags.contains(Flags::DELETED);
        let verdict = sieve::run(program, was_deleted);
        if verdict.deleted != was_deleted {
            if writable {
                lock(&message.attr).flags.set(Flags::DELETED, verdict.deleted);
            } else {
                lock(machine).warn(&format!(
                    "message {}: cannot {} in a read-only mailbox",
                    msgno,
                    if verdict.deleted { "discard" } else { "undelete" },
                ));
            }
        }

        if let Some(ref mut logger) = *logger {
            let text = message.header_value("Message-ID").unwrap_or_default();
            for action in verdict.actions {
                logger(&SieveAction {
                    msgno,
                    action: action.to_owned(),
                    text: text.clone(),
                });
            }
        }
    }

    /// Runs the machine's program over `messages`, which are numbered from
    /// 1. The logger is called without any lock held.
    fn run_sieve(
        &self,
        mach: RawHandle,
        messages: &[Arc<MessageObj>],
        writable: bool,
    ) -> Outcome<()> {
        let machine = self.machine(mach)?;
        let (program, mut logger) = {
            let mut m = lock(&machine);
            (m.program()?, m.logger.take())
        };

        for (ix, message) in messages.iter().enumerate() {
            self.judge(
                &machine,
                &program,
                ix + 1,
                message,
                writable,
                &mut logger,
            );
        }

        let mut m = lock(&machine);
        if m.logger.is_none() {
            m.logger = logger;
        }
        Ok(())
    }
}

#[cfg(test)]
pub fn test_engine() -> super::EngineRef {
    crate::init_test_log();
    Arc::new(LocalEngine::new(&Config::default()))
}

impl Engine for LocalEngine {
    fn destroy(&self, kind: HandleKind, handle: RawHandle) {
        let removed = lock(&self.objects).remove(&handle);
        trace!("Destroyed {} {:?}", kind, handle);

        match removed {
            Some(Object::Message(message)) => self.forget(&[message.attr_id]),
            Some(Object::Mailbox(mailbox)) => {
                let mailbox = lock(&mailbox);
                let mut store = lock(&mailbox.store);
                if Some(handle) == store.locker {
                    warn!("{} destroyed while locked", mailbox.url.text);
                    store.locker = None;
                }
                drop(store);
                self.forget(&[
                    mailbox.url_id,
                    mailbox.folder_id,
                    mailbox.debug_id,
                ]);
            },
            Some(Object::Mailcap(entries)) => self.forget(&entries),
            Some(_) => (),
            None => warn!("Destroying unknown {} {:?}", kind, handle),
        }
    }

    fn stream_create(
        &self,
        source: StreamSource<'_>,
        flags: StreamFlags,
    ) -> Outcome<RawHandle> {
        let backend: Box<dyn Backend> = match source {
            StreamSource::File(path) => {
                Box::new(FileBackend::new(path.to_owned()))
            },
            StreamSource::Tcp { host, port } => {
                Box::new(TcpBackend::new(host, port))
            },
            StreamSource::Stdio(fd) => Box::new(StdioBackend::new(fd)?),
            StreamSource::Memory(content) => {
                Box::new(MemoryBackend::new(content))
            },
            StreamSource::Program(command) => {
                Box::new(ProgramBackend::new(command))
            },
            StreamSource::FilterProgram { command, input } => Box::new(
                FilterProgramBackend::new(command, self.stream(input)?),
            ),
        };
        Ok(self.new_stream(backend, flags))
    }

    fn iconv_stream_create(
        &self,
        upstream: RawHandle,
        from: &str,
        to: &str,
        fallback: FallbackMode,
        flags: StreamFlags,
    ) -> Outcome<RawHandle> {
        let upstream = self.stream(upstream)?;
        let converter = Converter::new(from, to, fallback)?;
        Ok(self.new_stream(
            Box::new(IconvBackend::new(upstream, converter, self.chunk_size)),
            flags,
        ))
    }

    fn stream_open(&self, stream: RawHandle) -> Outcome<()> {
        lock(&*self.stream(stream)?).open()
    }

    fn stream_close(&self, stream: RawHandle) -> Outcome<()> {
        lock(&*self.stream(stream)?).close()
    }

    fn stream_flush(&self, stream: RawHandle) -> Outcome<()> {
        lock(&*self.stream(stream)?).flush()
    }

    fn stream_wait(
        &self,
        stream: RawHandle,
        flags: WaitFlags,
    ) -> Outcome<WaitFlags> {
        lock(&*self.stream(stream)?).wait(flags)
    }

    fn stream_read(&self, stream: RawHandle, buf: &mut [u8]) -> Outcome<usize> {
        lock(&*self.stream(stream)?).read(buf)
    }

    fn stream_readline(
        &self,
        stream: RawHandle,
        buf: &mut [u8],
    ) -> Outcome<usize> {
        lock(&*self.stream(stream)?).readline(buf)
    }

    fn stream_write(&self, stream: RawHandle, buf: &[u8]) -> Outcome<usize> {
        lock(&*self.stream(stream)?).write(buf)
    }

    fn stream_to_message(&self, stream: RawHandle) -> Outcome<RawHandle> {
        let content = lock(&*self.stream(stream)?).read_to_end()?;
        store::check_header_block(&content)?;
        Ok(self.new_message(content, Flags::empty()).id)
    }

    fn message_size(&self, msg: RawHandle) -> Outcome<usize> {
        Ok(self.message(msg)?.content.len())
    }

    fn message_lines(&self, msg: RawHandle) -> Outcome<usize> {
        Ok(self.message(msg)?.lines())
    }

    fn message_attribute(&self, msg: RawHandle) -> Outcome<RawHandle> {
        Ok(self.message(msg)?.attr_id)
    }

    fn message_stream(&self, msg: RawHandle) -> Outcome<RawHandle> {
        let message = self.message(msg)?;
        Ok(self.new_stream(
            Box::new(MemoryBackend::new(&message.content)),
            StreamFlags::READ,
        ))
    }

    fn message_header_value(
        &self,
        msg: RawHandle,
        name: &str,
    ) -> Outcome<String> {
        self.message(msg)?.header_value(name)
    }

    fn attribute_flags(&self, attr: RawHandle) -> Outcome<Flags> {
        Ok(lock(&*self.attribute(attr)?).flags)
    }

    fn attribute_set_flags(
        &self,
        attr: RawHandle,
        flags: Flags,
    ) -> Outcome<()> {
        lock(&*self.attribute(attr)?).flags |= flags;
        Ok(())
    }

    fn attribute_unset_flags(
        &self,
        attr: RawHandle,
        flags: Flags,
    ) -> Outcome<()> {
        lock(&*self.attribute(attr)?).flags &= !flags;
        Ok(())
    }

    fn attribute_is_modified(&self, attr: RawHandle) -> Outcome<bool> {
        Ok(lock(&*self.attribute(attr)?).modified)
    }

    fn attribute_set_modified(&self, attr: RawHandle) -> Outcome<()> {
        lock(&*self.attribute(attr)?).modified = true;
        Ok(())
    }

    fn attribute_clear_modified(&self, attr: RawHandle) -> Outcome<()> {
        lock(&*self.attribute(attr)?).modified = false;
        Ok(())
    }

    fn mailbox_create(&self, url: &str) -> Outcome<RawHandle> {
        Ok(self.new_mailbox(UrlObj::parse(url)?))
    }

    fn mailbox_create_default(&self, name: Option<&str>) -> Outcome<RawHandle> {
        let url = match name {
            None => self.default_url.clone(),
            Some(name) if name.contains(':') => name.to_owned(),
            Some(name) => {
                let scheme = self
                    .default_url
                    .split_once(':')
                    .map_or("memory", |(scheme, _)| scheme);
                format!("{}:{}", scheme, name)
            },
        };
        self.mailbox_create(&url)
    }

    fn mailbox_open(&self, mbox: RawHandle, flags: StreamFlags) -> Outcome<()> {
        lock(&*self.mailbox(mbox)?).open(flags);
        Ok(())
    }

    fn mailbox_close(&self, mbox: RawHandle) -> Outcome<()> {
        let mailbox = self.mailbox(mbox)?;
        let mut mailbox = lock(&mailbox);
        mailbox.store()?;
        mailbox.trace("close");
        mailbox.open = None;

        let mut store = lock(&mailbox.store);
        if Some(mbox) == store.locker {
            store.locker = None;
        }
        Ok(())
    }

    fn mailbox_flush(&self, mbox: RawHandle, expunge: bool) -> Outcome<()> {
        if expunge {
            self.mailbox_expunge(mbox)?;
        }
        self.mailbox_sync(mbox)
    }

    fn mailbox_messages_count(&self, mbox: RawHandle) -> Outcome<usize> {
        let store = lock(&*self.mailbox(mbox)?).store()?;
        let count = lock(&store).messages.len();
        Ok(count)
    }

    fn mailbox_messages_recent(&self, mbox: RawHandle) -> Outcome<usize> {
        let store = lock(&*self.mailbox(mbox)?).store()?;
        let recent = lock(&store).recent();
        Ok(recent)
    }

    fn mailbox_message_unseen(&self, mbox: RawHandle) -> Outcome<usize> {
        let store = lock(&*self.mailbox(mbox)?).store()?;
        let unseen = lock(&store).first_unseen();
        Ok(unseen)
    }

    fn mailbox_get_message(
        &self,
        mbox: RawHandle,
        msgno: usize,
    ) -> Outcome<RawHandle> {
        let store = lock(&*self.mailbox(mbox)?).store()?;
        let id = lock(&store).get(msgno)?.id;
        Ok(id)
    }

    fn mailbox_append_message(
        &self,
        mbox: RawHandle,
        msg: RawHandle,
    ) -> Outcome<()> {
        let store = lock(&*self.mailbox(mbox)?).writable_store()?;
        let source = self.message(msg)?;
        let copy =
            self.new_message(source.content.clone(), source.attr().flags);
        lock(&store).messages.push(copy);
        Ok(())
    }

    fn mailbox_expunge(&self, mbox: RawHandle) -> Outcome<()> {
        let mailbox = self.mailbox(mbox)?;
        let store = {
            let mailbox = lock(&mailbox);
            mailbox.trace("expunge");
            mailbox.writable_store()?
        };
        let doomed = lock(&store).expunge();
        debug!("Expunged {} messages", doomed.len());

        let handles = doomed
            .iter()
            .flat_map(|m| vec![m.id, m.attr_id])
            .collect::<Vec<_>>();
        self.forget(&handles);
        Ok(())
    }

    fn mailbox_sync(&self, mbox: RawHandle) -> Outcome<()> {
        let store = lock(&*self.mailbox(mbox)?).store()?;
        lock(&store).clear_modified();
        Ok(())
    }

    fn mailbox_lock(&self, mbox: RawHandle) -> Outcome<()> {
        let mailbox = self.mailbox(mbox)?;
        let mailbox = lock(&mailbox);
        let store = mailbox.store()?;
        let mut store = lock(&store);
        if store.locker.is_some() {
            return Err(Code::LockConflict.into());
        }

        mailbox.trace("lock");
        store.locker = Some(mbox);
        Ok(())
    }

    fn mailbox_unlock(&self, mbox: RawHandle) -> Outcome<()> {
        let mailbox = self.mailbox(mbox)?;
        let mailbox = lock(&mailbox);
        let store = mailbox.store()?;
        let mut store = lock(&store);
        if Some(mbox) != store.locker {
            return Err(Code::LockNotHeld.into());
        }

        mailbox.trace("unlock");
        store.locker = None;
        Ok(())
    }

    fn mailbox_size(&self, mbox: RawHandle) -> Outcome<u64> {
        let store = lock(&*self.mailbox(mbox)?).store()?;
        let size = lock(&store).size();
        Ok(size)
    }

    fn mailbox_folder(&self, mbox: RawHandle) -> Outcome<RawHandle> {
        Ok(lock(&*self.mailbox(mbox)?).folder_id)
    }

    fn mailbox_url(&self, mbox: RawHandle) -> Outcome<RawHandle> {
        Ok(lock(&*self.mailbox(mbox)?).url_id)
    }

    fn mailbox_debug(&self, mbox: RawHandle) -> Outcome<RawHandle> {
        Ok(lock(&*self.mailbox(mbox)?).debug_id)
    }

    fn folder_name(&self, folder: RawHandle) -> Outcome<String> {
        Ok(String::clone(&*self.folder(folder)?))
    }

    fn url_string(&self, url: RawHandle) -> Outcome<String> {
        Ok(self.url(url)?.text.clone())
    }

    fn url_scheme(&self, url: RawHandle) -> Outcome<String> {
        Ok(self.url(url)?.scheme.clone())
    }

    fn url_path(&self, url: RawHandle) -> Outcome<String> {
        Ok(self.url(url)?.path.clone())
    }

    fn debug_level(&self, debug: RawHandle) -> Outcome<u32> {
        Ok(self.debug(debug)?.load(Ordering::Relaxed))
    }

    fn debug_set_level(&self, debug: RawHandle, level: u32) -> Outcome<()> {
        self.debug(debug)?.store(level, Ordering::Relaxed);
        Ok(())
    }

    fn address_create(&self, text: &str) -> Outcome<RawHandle> {
        let addrs = mail::parse_addresses(text)?;
        Ok(self.register(Object::Address(Arc::new(addrs))))
    }

    fn address_count(&self, addr: RawHandle) -> Outcome<usize> {
        Ok(self.address(addr)?.len())
    }

    fn address_email(&self, addr: RawHandle, no: usize) -> Outcome<String> {
        Ok(nth(&self.address(addr)?, no)?.email.clone())
    }

    fn address_to_string(&self, addr: RawHandle) -> Outcome<String> {
        Ok(mail::addresses_to_string(&self.address(addr)?))
    }

    fn mailer_create(&self, url: &str) -> Outcome<RawHandle> {
        let mailer = MailerObj::parse(url)?;
        debug!("Created mailer {}", url);
        Ok(self.register(Object::Mailer(Arc::new(Mutex::new(mailer)))))
    }

    fn mailer_open(
        &self,
        mailer: RawHandle,
        _flags: StreamFlags,
    ) -> Outcome<()> {
        lock(&*self.mailer(mailer)?).open = true;
        Ok(())
    }

    fn mailer_close(&self, mailer: RawHandle) -> Outcome<()> {
        let mailer = self.mailer(mailer)?;
        let mut mailer = lock(&mailer);
        if !mailer.open {
            return Err(Code::NotOpen.into());
        }
        mailer.open = false;
        Ok(())
    }

    fn mailer_send_message(
        &self,
        mailer: RawHandle,
        msg: RawHandle,
        from: Option<RawHandle>,
        to: Option<RawHandle>,
    ) -> Outcome<()> {
        let transport = {
            let mailer = self.mailer(mailer)?;
            let mailer = lock(&mailer);
            if !mailer.open {
                return Err(Code::NotOpen.into());
            }
            mailer.transport.clone()
        };

        let message = self.message(msg)?;
        let from = from.map(|h| self.address(h)).transpose()?;
        let to = to.map(|h| self.address(h)).transpose()?;
        let (from, to) = mail::envelope(
            &message,
            from.as_ref().map(|a| a.as_slice()),
            to.as_ref().map(|a| a.as_slice()),
        )?;

        match transport {
            Transport::Memory => {
                info!("Accepted message from {} for {}", from, to.join(", "));
                lock(&self.outbox).push(SentMessage {
                    from,
                    to,
                    content: message.content.clone(),
                });
                Ok(())
            },
            Transport::Program(ref command) => {
                mail::run_program(command, &to, &message.content)
            },
        }
    }

    fn sieve_machine_init(&self) -> Outcome<RawHandle> {
        Ok(self.register(Object::SieveMachine(Arc::new(Mutex::new(
            SieveObj::default(),
        )))))
    }

    fn sieve_compile(&self, mach: RawHandle, script: &Path) -> Outcome<()> {
        lock(&*self.machine(mach)?).compile(script)
    }

    fn sieve_disass(&self, mach: RawHandle) -> Outcome<String> {
        lock(&*self.machine(mach)?).disassemble()
    }

    fn sieve_message(&self, mach: RawHandle, msg: RawHandle) -> Outcome<()> {
        let message = self.message(msg)?;
        self.run_sieve(mach, &[message], true)
    }

    fn sieve_mailbox(&self, mach: RawHandle, mbox: RawHandle) -> Outcome<()> {
        let (store, writable) = {
            let mailbox = self.mailbox(mbox)?;
            let mailbox = lock(&mailbox);
            (mailbox.store()?, mailbox.is_writable())
        };
        let messages = lock(&store).messages.clone();
        self.run_sieve(mach, &messages, writable)
    }

    fn sieve_error_text(&self, mach: RawHandle) -> Outcome<String> {
        Ok(lock(&*self.machine(mach)?).take_errors())
    }

    fn sieve_set_logger(
        &self,
        mach: RawHandle,
        logger: SieveLogger,
    ) -> Outcome<()> {
        lock(&*self.machine(mach)?).logger = Some(logger);
        Ok(())
    }

    fn mailcap_create(&self, stream: RawHandle) -> Outcome<RawHandle> {
        let content = lock(&*self.stream(stream)?).read_to_end()?;
        let entries = mailcap::parse(&content)?
            .into_iter()
            .map(|fields| self.register(Object::MailcapEntry(Arc::new(fields))))
            .collect::<Vec<_>>();
        debug!("Parsed {} mailcap entries", entries.len());
        Ok(self.register(Object::Mailcap(Arc::new(entries))))
    }

    fn mailcap_entries_count(&self, mailcap: RawHandle) -> Outcome<usize> {
        Ok(self.mailcap(mailcap)?.len())
    }

    fn mailcap_get_entry(
        &self,
        mailcap: RawHandle,
        no: usize,
    ) -> Outcome<RawHandle> {
        Ok(*nth(&self.mailcap(mailcap)?, no)?)
    }

    fn mailcap_entry_fields_count(&self, entry: RawHandle) -> Outcome<usize> {
        Ok(self.mailcap_entry(entry)?.len())
    }

    fn mailcap_entry_get_field(
        &self,
        entry: RawHandle,
        no: usize,
    ) -> Outcome<String> {
        Ok(nth(&self.mailcap_entry(entry)?, no)?.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn engine() -> LocalEngine {
        crate::init_test_log();
        LocalEngine::new(&Config::default())
    }

    fn message(engine: &LocalEngine, text: &[u8]) -> RawHandle {
        let stream = engine
            .stream_create(StreamSource::Memory(text), StreamFlags::RDWR)
            .unwrap();
        engine.stream_open(stream).unwrap();
        let msg = engine.stream_to_message(stream).unwrap();
        engine.destroy(HandleKind::Stream, stream);
        msg
    }

    #[test]
    fn unknown_and_mismatched_handles() {
        let engine = engine();
        let bogus = RawHandle::from_raw(999);
        assert_eq!(Err(Errno::EINVAL.into()), engine.message_size(bogus));

        let msg = message(&engine, b"Subject: x\n\n");
        assert_eq!(Err(Errno::EINVAL.into()), engine.stream_open(msg));
    }

    #[test]
    fn destroying_a_message_drops_its_attribute() {
        let engine = engine();
        let msg = message(&engine, b"Subject: x\n\n");
        let attr = engine.message_attribute(msg).unwrap();
        assert!(engine.attribute_flags(attr).is_ok());

        engine.destroy(HandleKind::Message, msg);
        assert!(engine.attribute_flags(attr).is_err());
        assert_eq!(0, lock(&engine.objects).len());
    }

    #[test]
    fn destroying_a_mailbox_releases_everything() {
        let engine = engine();
        let mbox = engine.mailbox_create("memory:teardown").unwrap();
        let url = engine.mailbox_url(mbox).unwrap();
        engine.mailbox_open(mbox, StreamFlags::RDWR).unwrap();
        engine.mailbox_lock(mbox).unwrap();

        engine.destroy(HandleKind::Mailbox, mbox);
        assert!(engine.url_path(url).is_err());

        let other = engine.mailbox_create("memory://teardown").unwrap();
        engine.mailbox_open(other, StreamFlags::READ).unwrap();
        engine.mailbox_lock(other).unwrap();
    }

    #[test]
    fn closing_releases_lock() {
        let engine = engine();
        let a = engine.mailbox_create("memory:close-lock").unwrap();
        let b = engine.mailbox_create("memory:close-lock").unwrap();
        engine.mailbox_open(a, StreamFlags::READ).unwrap();
        engine.mailbox_open(b, StreamFlags::READ).unwrap();
        engine.mailbox_lock(a).unwrap();
        engine.mailbox_close(a).unwrap();
        engine.mailbox_lock(b).unwrap();
        assert_eq!(
            Err(Code::NotOpen.into()),
            engine.mailbox_close(a)
        );
    }

    #[test]
    fn default_mailbox_follows_configuration() {
        let mut config = Config::default();
        config.mailbox.default_url = "memory://spool".to_owned();
        let engine = LocalEngine::new(&config);

        let inbox = engine.mailbox_create_default(None).unwrap();
        let url = engine.mailbox_url(inbox).unwrap();
        assert_eq!("spool", engine.url_path(url).unwrap());

        let other = engine.mailbox_create_default(Some("memory:x")).unwrap();
        let url = engine.mailbox_url(other).unwrap();
        assert_eq!("memory:x", engine.url_string(url).unwrap());
    }

    #[test]
    fn appended_message_is_a_copy() {
        let engine = engine();
        let mbox = engine.mailbox_create("memory:copy").unwrap();
        engine.mailbox_open(mbox, StreamFlags::RDWR).unwrap();

        let msg = message(&engine, b"Subject: x\n\n");
        let attr = engine.message_attribute(msg).unwrap();
        engine.attribute_set_flags(attr, Flags::FLAGGED).unwrap();
        engine.mailbox_append_message(mbox, msg).unwrap();
        engine.attribute_set_flags(attr, Flags::SEEN).unwrap();

        let stored = engine.mailbox_get_message(mbox, 1).unwrap();
        assert_ne!(msg, stored);
        let stored_attr = engine.message_attribute(stored).unwrap();
        assert_eq!(Ok(Flags::FLAGGED), engine.attribute_flags(stored_attr));
    }

    #[test]
    fn sieve_mailbox_requires_open() {
        let engine = engine();
        let mach = engine.sieve_machine_init().unwrap();
        let mbox = engine.mailbox_create("memory:sieve").unwrap();
        assert_eq!(
            Err(Code::NotOpen.into()),
            engine.sieve_mailbox(mach, mbox)
        );
    }

    #[test]
    fn mailcap_entries_go_with_the_mailcap() {
        let engine = engine();
        let stream = engine
            .stream_create(
                StreamSource::Memory(b"text/plain; cat %s\n"),
                StreamFlags::READ,
            )
            .unwrap();
        engine.stream_open(stream).unwrap();
        let mailcap = engine.mailcap_create(stream).unwrap();
        let entry = engine.mailcap_get_entry(mailcap, 1).unwrap();
        assert_eq!(
            Ok("cat %s".to_owned()),
            engine.mailcap_entry_get_field(entry, 2)
        );

        engine.destroy(HandleKind::Mailcap, mailcap);
        assert!(engine.mailcap_entry_fields_count(entry).is_err());
    }
}
