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

//! Messages and in-memory mailbox stores.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use lazy_static::lazy_static;
use log::debug;
use memchr::{memchr, memchr_iter};
use nix::errno::Errno;
use regex::bytes::Regex;

use super::lock;
use crate::attribute::Flags;
use crate::native::{Outcome, RawHandle};
use crate::stream::StreamFlags;
use crate::support::status::{Code, Status};

lazy_static! {
    static ref FIELD: Regex = Regex::new(r"^[!-9;-~]+:").unwrap();
}

/// The `MU_ATTRIBUTE_*` bits of a message plus its modified meta-flag.
#[derive(Clone, Copy, Debug)]
pub(super) struct AttrState {
    pub(super) flags: Flags,
    pub(super) modified: bool,
}

impl AttrState {
    pub(super) fn new(flags: Flags) -> Self {
        AttrState {
            flags,
            modified: false,
        }
    }
}

pub(super) struct MessageObj {
    pub(super) id: RawHandle,
    pub(super) attr_id: RawHandle,
    pub(super) content: Vec<u8>,
    pub(super) attr: Arc<Mutex<AttrState>>,
}

impl MessageObj {
    pub(super) fn new(
        id: RawHandle,
        attr_id: RawHandle,
        content: Vec<u8>,
        attr: AttrState,
    ) -> Self {
        MessageObj {
            id,
            attr_id,
            content,
            attr: Arc::new(Mutex::new(attr)),
        }
    }

    pub(super) fn lines(&self) -> usize {
        memchr_iter(b'\n', &self.content).count()
    }

    pub(super) fn header_value(&self, name: &str) -> Outcome<String> {
        header_value(&self.content, name).ok_or_else(|| Code::NoEnt.into())
    }

    pub(super) fn attr(&self) -> AttrState {
        *lock(&self.attr)
    }
}

/// The lines of the header block, without their terminators.
fn header_lines(content: &[u8]) -> impl Iterator<Item = &[u8]> {
    content
        .split(|&b| b'\n' == b)
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .take_while(|line| !line.is_empty())
}

/// Checks that `content` starts with a header block: an optional mbox
/// `From ` line followed by at least one `Name: value` field.
pub(super) fn check_header_block(content: &[u8]) -> Outcome<()> {
    let mut fields = 0;
    for (ix, line) in header_lines(content).enumerate() {
        if 0 == ix && line.starts_with(b"From ") {
            continue;
        }

        if FIELD.is_match(line) {
            fields += 1;
        } else if fields > 0 && (line[0] == b' ' || line[0] == b'\t') {
            // Continuation
        } else {
            return Err(Code::Parse.into());
        }
    }

    if fields > 0 {
        Ok(())
    } else {
        Err(Code::Parse.into())
    }
}

/// The unfolded value of the first field called `name`.
pub(super) fn header_value(content: &[u8], name: &str) -> Option<String> {
    let mut value: Option<Vec<u8>> = None;
    for line in header_lines(content) {
        if line[0] == b' ' || line[0] == b'\t' {
            if let Some(ref mut value) = value {
                value.push(b' ');
                value.extend_from_slice(trim(line));
            }
            continue;
        }

        if value.is_some() {
            break;
        }

        if let Some(colon) = memchr(b':', line) {
            if line[..colon].eq_ignore_ascii_case(name.as_bytes()) {
                value = Some(trim(&line[colon + 1..]).to_vec());
            }
        }
    }

    value.map(|v| String::from_utf8_lossy(trim(&v)).into_owned())
}

fn trim(mut s: &[u8]) -> &[u8] {
    while let Some((&b, rest)) = s.split_first() {
        if !b.is_ascii_whitespace() {
            break;
        }
        s = rest;
    }
    while let Some((&b, rest)) = s.split_last() {
        if !b.is_ascii_whitespace() {
            break;
        }
        s = rest;
    }
    s
}

/// The messages behind one `memory:` URL, shared by every mailbox opened
/// on it.
#[derive(Default)]
pub(super) struct Store {
    pub(super) messages: Vec<Arc<MessageObj>>,
    /// The mailbox currently holding the lock.
    pub(super) locker: Option<RawHandle>,
}

impl Store {
    pub(super) fn get(&self, msgno: usize) -> Outcome<&Arc<MessageObj>> {
        msgno
            .checked_sub(1)
            .and_then(|ix| self.messages.get(ix))
            .ok_or_else(|| Code::NoEnt.into())
    }

    pub(super) fn recent(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| !m.attr().flags.intersects(Flags::SEEN | Flags::READ))
            .count()
    }

    pub(super) fn first_unseen(&self) -> usize {
        self.messages
            .iter()
            .position(|m| !m.attr().flags.contains(Flags::SEEN))
            .map_or(0, |ix| ix + 1)
    }

    pub(super) fn size(&self) -> u64 {
        self.messages.iter().map(|m| m.content.len() as u64).sum()
    }

    pub(super) fn clear_modified(&self) {
        for message in &self.messages {
            lock(&message.attr).modified = false;
        }
    }

    /// Removes messages flagged DELETED, returning them.
    pub(super) fn expunge(&mut self) -> Vec<Arc<MessageObj>> {
        let (doomed, kept): (Vec<_>, Vec<_>) = self
            .messages
            .drain(..)
            .partition(|m| m.attr().flags.contains(Flags::DELETED));
        self.messages = kept;
        doomed
    }
}

/// A parsed mailbox URL.
#[derive(Clone, Debug)]
pub(super) struct UrlObj {
    pub(super) text: String,
    pub(super) scheme: String,
    pub(super) path: String,
}

impl UrlObj {
    pub(super) fn parse(url: &str) -> Outcome<Self> {
        let (scheme, rest) = url
            .split_once(':')
            .ok_or_else(|| Status::from(Code::NoInterface))?;
        if "memory" != scheme {
            return Err(Code::NoInterface.into());
        }

        let path = rest.trim_start_matches("//");
        if path.is_empty() {
            return Err(Code::UrlMissParts.into());
        }

        Ok(UrlObj {
            text: url.to_owned(),
            scheme: scheme.to_owned(),
            path: path.to_owned(),
        })
    }
}

/// One mailbox wrapper's view of a store.
pub(super) struct MailboxObj {
    pub(super) url: Arc<UrlObj>,
    pub(super) store: Arc<Mutex<Store>>,
    pub(super) open: Option<StreamFlags>,
    pub(super) url_id: RawHandle,
    pub(super) folder_id: RawHandle,
    pub(super) debug_id: RawHandle,
    pub(super) debug_level: Arc<AtomicU32>,
}

impl MailboxObj {
    /// The store, if the mailbox is open.
    pub(super) fn store(&self) -> Outcome<Arc<Mutex<Store>>> {
        match self.open {
            Some(_) => Ok(Arc::clone(&self.store)),
            None => Err(Code::NotOpen.into()),
        }
    }

    /// The store, if the mailbox is open for writing.
    pub(super) fn writable_store(&self) -> Outcome<Arc<Mutex<Store>>> {
        match self.open {
            Some(flags) if flags.writable() => Ok(Arc::clone(&self.store)),
            Some(_) => Err(Errno::EACCES.into()),
            None => Err(Code::NotOpen.into()),
        }
    }

    pub(super) fn is_writable(&self) -> bool {
        self.open.map_or(false, StreamFlags::writable)
    }

    /// Logs `what` if the mailbox's debug level asks for it.
    pub(super) fn trace(&self, what: &str) {
        if self.debug_level.load(Ordering::Relaxed) > 0 {
            debug!("{}: {}", self.url.text, what);
        }
    }

    pub(super) fn open(&mut self, flags: StreamFlags) {
        self.trace(&format!("open {:?}", flags));
        self.open = Some(flags);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_block_validation() {
        assert!(check_header_block(b"Subject: x\n\nbody").is_ok());
        assert!(check_header_block(b"From a@b Mon Jan 1\nTo: b\n").is_ok());
        assert!(check_header_block(b"A: 1\r\n\tfolded\r\n\r\n").is_ok());
        assert!(check_header_block(b"\nbody only").is_err());
        assert!(check_header_block(b" leading continuation: x\n").is_err());
        assert!(check_header_block(b"no colon here\n").is_err());
        assert!(check_header_block(b"").is_err());
    }

    #[test]
    fn header_lookup() {
        let content =
            b"To: a\nsubject:  one\n  two\nSubject: second\n\nX: body\n";
        assert_eq!(Some("a".to_owned()), header_value(content, "to"));
        assert_eq!(
            Some("one two".to_owned()),
            header_value(content, "Subject")
        );
        assert_eq!(None, header_value(content, "X"));
    }

    #[test]
    fn url_parsing() {
        let url = UrlObj::parse("memory://box").unwrap();
        assert_eq!("memory", url.scheme);
        assert_eq!("box", url.path);
        assert_eq!(
            Err(Code::NoInterface.into()),
            UrlObj::parse("mbox:/var/mail/x").map(|u| u.text)
        );
        assert_eq!(
            Err(Code::UrlMissParts.into()),
            UrlObj::parse("memory:").map(|u| u.text)
        );
    }
}
