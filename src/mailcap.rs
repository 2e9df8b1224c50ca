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

//! Mailcap capability files.
//!
//! Entries are numbered from 1 and walked the same way as the messages of a
//! mailbox: `Mailcap::entries()` is bounded by the entry count when the walk
//! starts.

use crate::handle::Handle;
use crate::native::HandleKind;
use crate::stream::Stream;
use crate::support::error::{Result, ResultExt, Subsystem};
use crate::support::snapshot::Snapshot;

/// A parsed mailcap file.
#[derive(Clone, Debug)]
pub struct Mailcap {
    handle: Handle,
}

impl Mailcap {
    /// Parses the remaining content of `stream`.
    pub fn parse(stream: &Stream) -> Result<Self> {
        let engine = stream.handle().engine_ref();
        let raw = engine
            .mailcap_create(stream.handle().raw()?)
            .or_fail(Subsystem::Mailcap)?;
        Ok(Mailcap {
            handle: Handle::acquire(engine, HandleKind::Mailcap, raw),
        })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn entries_count(&self) -> Result<usize> {
        self.handle
            .engine()
            .mailcap_entries_count(self.handle.raw()?)
            .or_fail(Subsystem::Mailcap)
    }

    /// Returns entry number `no`, counting from 1.
    pub fn get(&self, no: usize) -> Result<MailcapEntry> {
        let raw = self
            .handle
            .engine()
            .mailcap_get_entry(self.handle.raw()?, no)
            .or_fail(Subsystem::Mailcap)?;
        Ok(MailcapEntry {
            handle: Handle::borrow(
                self.handle.engine_ref(),
                HandleKind::MailcapEntry,
                raw,
                Some(&self.handle),
            ),
        })
    }

    /// Starts a walk over the entries.
    pub fn entries(&self) -> Entries<'_> {
        Snapshot::new(self, self.entries_count(), Mailcap::get)
    }

    /// The first entry whose type matches `content_type`.
    ///
    /// The entry type may end in `/*` to match a whole family of types.
    pub fn find(&self, content_type: &str) -> Result<Option<MailcapEntry>> {
        for entry in self.entries() {
            let entry = entry?;
            if type_matches(&entry.type_field()?, content_type) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}

fn type_matches(pattern: &str, content_type: &str) -> bool {
    let content_type = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim();
    if pattern.eq_ignore_ascii_case(content_type) {
        return true;
    }

    match (pattern.split_once('/'), content_type.split_once('/')) {
        (Some((ptop, "*")), Some((ctop, _))) => ptop.eq_ignore_ascii_case(ctop),
        (None, Some((ctop, _))) => pattern.eq_ignore_ascii_case(ctop),
        _ => false,
    }
}

impl<'a> IntoIterator for &'a Mailcap {
    type Item = Result<MailcapEntry>;
    type IntoIter = Entries<'a>;

    fn into_iter(self) -> Entries<'a> {
        self.entries()
    }
}

/// A walk over the entries present when the walk started.
pub type Entries<'a> = Snapshot<'a, Mailcap, MailcapEntry>;

/// One record of a mailcap file: an ordered list of fields, the first being
/// the content type and the second the view command.
#[derive(Clone, Debug)]
pub struct MailcapEntry {
    handle: Handle,
}

impl MailcapEntry {
    pub fn fields_count(&self) -> Result<usize> {
        self.handle
            .engine()
            .mailcap_entry_fields_count(self.handle.raw()?)
            .or_fail(Subsystem::Mailcap)
    }

    /// Returns field number `no`, counting from 1.
    pub fn field(&self, no: usize) -> Result<String> {
        self.handle
            .engine()
            .mailcap_entry_get_field(self.handle.raw()?, no)
            .or_fail(Subsystem::Mailcap)
    }

    /// Every field, in file order.
    pub fn fields(&self) -> Result<Vec<String>> {
        (1..=self.fields_count()?).map(|no| self.field(no)).collect()
    }

    pub fn type_field(&self) -> Result<String> {
        self.field(1)
    }

    pub fn view_command(&self) -> Result<String> {
        self.field(2)
    }

    /// Looks up an optional field by name.
    ///
    /// `name=value` fields yield their value; bare flag fields such as
    /// `needsterminal` yield an empty string.
    pub fn get(&self, name: &str) -> Result<Option<String>> {
        for no in 3..=self.fields_count()? {
            let field = self.field(no)?;
            let (key, value) = match field.split_once('=') {
                Some((key, value)) => (key.trim(), value.trim()),
                None => (field.trim(), ""),
            };
            if key.eq_ignore_ascii_case(name) {
                return Ok(Some(value.to_owned()));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::native::local;
    use crate::support::error::Error;
    use crate::support::status::Code;

    const MAILCAP: &str = "\
# Sample mailcap
text/html; lynx -dump %s; copiousoutput; nametemplate=%s.html

image/*; display %s; \\
    test=test -n \"$DISPLAY\"
application/x-odd; odd \\; command %s; needsterminal
";

    fn mailcap(text: &str) -> Result<Mailcap> {
        let engine = local::test_engine();
        let stream = Stream::memory(&engine, text.as_bytes())?;
        Mailcap::parse(&stream)
    }

    #[test]
    fn entries_in_order() {
        let mailcap = mailcap(MAILCAP).unwrap();
        assert_eq!(3, mailcap.entries_count().unwrap());
        let types = mailcap
            .entries()
            .map(|e| e.unwrap().type_field().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(vec!["text/html", "image/*", "application/x-odd"], types);
        assert_eq!(3, mailcap.entries().len());
    }

    #[test]
    fn fields_keep_file_order() {
        let mailcap = mailcap(MAILCAP).unwrap();
        let html = mailcap.get(1).unwrap();
        assert_eq!(
            vec![
                "text/html",
                "lynx -dump %s",
                "copiousoutput",
                "nametemplate=%s.html"
            ],
            html.fields().unwrap()
        );
        assert_eq!("lynx -dump %s", html.view_command().unwrap());
        assert_eq!(
            Some("%s.html".to_owned()),
            html.get("nametemplate").unwrap()
        );
        assert_eq!(Some(String::new()), html.get("copiousoutput").unwrap());
        assert_eq!(None, html.get("needsterminal").unwrap());
    }

    #[test]
    fn continuations_and_escapes() {
        let mailcap = mailcap(MAILCAP).unwrap();
        let image = mailcap.get(2).unwrap();
        assert_eq!(
            Some("test -n \"$DISPLAY\"".to_owned()),
            image.get("test").unwrap()
        );
        let odd = mailcap.get(3).unwrap();
        assert_eq!("odd ; command %s", odd.view_command().unwrap());
    }

    #[test]
    fn find_by_type() {
        let mailcap = mailcap(MAILCAP).unwrap();
        let entry = mailcap.find("image/png").unwrap().unwrap();
        assert_eq!("display %s", entry.view_command().unwrap());
        let entry = mailcap.find("TEXT/HTML; charset=utf-8").unwrap().unwrap();
        assert_eq!("text/html", entry.type_field().unwrap());
        assert!(mailcap.find("audio/ogg").unwrap().is_none());
    }

    #[test]
    fn bounds_and_empty_file() {
        let mailcap = mailcap(MAILCAP).unwrap();
        assert!(mailcap.get(0).unwrap_err().is(Code::NoEnt));
        assert!(mailcap.get(4).unwrap_err().is(Code::NoEnt));
        assert!(mailcap.get(1).unwrap().field(5).unwrap_err().is(Code::NoEnt));

        let empty = self::mailcap("# nothing here\n\n").unwrap();
        assert_eq!(0, empty.entries().count());
    }

    #[test]
    fn short_record_is_parse_error() {
        let err = mailcap("text/plain\n").unwrap_err();
        assert_matches!(Error::Mailcap(_), &err);
        assert!(err.is(Code::Parse));
    }

    #[test]
    fn entry_keeps_mailcap_alive() {
        let entry = mailcap(MAILCAP).unwrap().get(1).unwrap();
        assert_eq!("text/html", entry.type_field().unwrap());
    }
}
