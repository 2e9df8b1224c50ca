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

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::status::{Code, Status};
use crate::native::HandleKind;

pub type Result<T> = std::result::Result<T, Error>;

/// The native subsystem that reported a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Subsystem {
    Address,
    Auth,
    Body,
    Debug,
    Envelope,
    Folder,
    Header,
    Mailer,
    Mailbox,
    Mailcap,
    Message,
    Mime,
    Secret,
    SieveMachine,
    Stream,
    Url,
}

/// A nonzero status together with its human-readable text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub status: Status,
    pub text: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.text)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Address error {0}")]
    Address(Failure),
    #[error("Authentication error {0}")]
    Auth(Failure),
    #[error("Body error {0}")]
    Body(Failure),
    #[error("Debug error {0}")]
    Debug(Failure),
    #[error("Envelope error {0}")]
    Envelope(Failure),
    #[error("Folder error {0}")]
    Folder(Failure),
    #[error("Header error {0}")]
    Header(Failure),
    #[error("Mailer error {0}")]
    Mailer(Failure),
    #[error("Mailbox error {0}")]
    Mailbox(Failure),
    #[error("Mailcap error {0}")]
    Mailcap(Failure),
    #[error("Message error {0}")]
    Message(Failure),
    #[error("MIME error {0}")]
    Mime(Failure),
    #[error("Secret error {0}")]
    Secret(Failure),
    #[error("Sieve machine error {0}")]
    SieveMachine(Failure),
    #[error("Stream error {0}")]
    Stream(Failure),
    #[error("URL error {0}")]
    Url(Failure),
    #[error("{0} handle used after it was disposed")]
    Disposed(HandleKind),
    #[error("Cannot load engine library {}: {reason}", .path.display())]
    Library { path: PathBuf, reason: String },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Config(#[from] toml::de::Error),
}

impl Subsystem {
    /// Translates a nonzero status raised by this subsystem into an `Error`.
    ///
    /// If `detail` is `None`, the text is the standard description of
    /// `status`.
    pub fn fail(self, status: Status, detail: Option<String>) -> Error {
        debug_assert!(!status.is_ok(), "translating a success status");

        let failure = Failure {
            status,
            text: detail
                .unwrap_or_else(|| status.description().into_owned()),
        };

        match self {
            Subsystem::Address => Error::Address(failure),
            Subsystem::Auth => Error::Auth(failure),
            Subsystem::Body => Error::Body(failure),
            Subsystem::Debug => Error::Debug(failure),
            Subsystem::Envelope => Error::Envelope(failure),
            Subsystem::Folder => Error::Folder(failure),
            Subsystem::Header => Error::Header(failure),
            Subsystem::Mailer => Error::Mailer(failure),
            Subsystem::Mailbox => Error::Mailbox(failure),
            Subsystem::Mailcap => Error::Mailcap(failure),
            Subsystem::Message => Error::Message(failure),
            Subsystem::Mime => Error::Mime(failure),
            Subsystem::Secret => Error::Secret(failure),
            Subsystem::SieveMachine => Error::SieveMachine(failure),
            Subsystem::Stream => Error::Stream(failure),
            Subsystem::Url => Error::Url(failure),
        }
    }

    /// Checks a raw integer status: zero passes, anything else is translated.
    pub fn check(self, raw: i32) -> Result<()> {
        if 0 == raw {
            Ok(())
        } else {
            Err(self.fail(Status(raw), None))
        }
    }
}

impl Error {
    fn failure(&self) -> Option<&Failure> {
        match *self {
            Error::Address(ref f)
            | Error::Auth(ref f)
            | Error::Body(ref f)
            | Error::Debug(ref f)
            | Error::Envelope(ref f)
            | Error::Folder(ref f)
            | Error::Header(ref f)
            | Error::Mailer(ref f)
            | Error::Mailbox(ref f)
            | Error::Mailcap(ref f)
            | Error::Message(ref f)
            | Error::Mime(ref f)
            | Error::Secret(ref f)
            | Error::SieveMachine(ref f)
            | Error::Stream(ref f)
            | Error::Url(ref f) => Some(f),
            Error::Disposed(_)
            | Error::Library { .. }
            | Error::Io(_)
            | Error::Config(_) => None,
        }
    }

    /// The native status behind this error, if it came from the engine.
    pub fn status(&self) -> Option<Status> {
        self.failure().map(|f| f.status)
    }

    /// The engine's text for this error, if it came from the engine.
    pub fn text(&self) -> Option<&str> {
        self.failure().map(|f| &f.text[..])
    }

    pub fn subsystem(&self) -> Option<Subsystem> {
        Some(match *self {
            Error::Address(_) => Subsystem::Address,
            Error::Auth(_) => Subsystem::Auth,
            Error::Body(_) => Subsystem::Body,
            Error::Debug(_) => Subsystem::Debug,
            Error::Envelope(_) => Subsystem::Envelope,
            Error::Folder(_) => Subsystem::Folder,
            Error::Header(_) => Subsystem::Header,
            Error::Mailer(_) => Subsystem::Mailer,
            Error::Mailbox(_) => Subsystem::Mailbox,
            Error::Mailcap(_) => Subsystem::Mailcap,
            Error::Message(_) => Subsystem::Message,
            Error::Mime(_) => Subsystem::Mime,
            Error::Secret(_) => Subsystem::Secret,
            Error::SieveMachine(_) => Subsystem::SieveMachine,
            Error::Stream(_) => Subsystem::Stream,
            Error::Url(_) => Subsystem::Url,
            _ => return None,
        })
    }

    /// Whether retrying the same operation later might succeed.
    pub fn is_transient(&self) -> bool {
        use nix::errno::Errno;

        let status = match self.status() {
            Some(status) => status,
            None => return false,
        };

        match status.code() {
            Some(Code::LockConflict)
            | Some(Code::ConnClosed)
            | Some(Code::InfoUnavailable) => true,
            Some(_) => false,
            None => {
                status == Status::from(Errno::EAGAIN)
                    || status == Status::from(Errno::EINTR)
                    || status == Status::from(Errno::EBUSY)
            }
        }
    }

    /// Whether this error carries the given engine code.
    pub fn is(&self, code: Code) -> bool {
        self.status().map_or(false, |s| s == code)
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            e => io::Error::new(io::ErrorKind::Other, e),
        }
    }
}

/// Adapts results coming across the native boundary.
pub trait ResultExt<T> {
    /// Translates a failed status in the context of `subsystem`.
    fn or_fail(self, subsystem: Subsystem) -> Result<T>;
}

impl<T> ResultExt<T> for std::result::Result<T, Status> {
    fn or_fail(self, subsystem: Subsystem) -> Result<T> {
        self.map_err(|status| subsystem.fail(status, None))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn translation_keeps_code_and_text() {
        let err = Subsystem::Mailbox.fail(Code::LockConflict.into(), None);
        assert_matches!(Error::Mailbox(_), &err);
        assert_eq!(Some(Status::from(Code::LockConflict)), err.status());
        assert_eq!(Some("Conflict with previous locker"), err.text());
        assert_eq!(Some(Subsystem::Mailbox), err.subsystem());
        assert!(err.is_transient());
        assert_eq!(
            "Mailbox error 4106: Conflict with previous locker",
            err.to_string()
        );
    }

    #[test]
    fn explicit_detail_replaces_description() {
        let err = Subsystem::SieveMachine.fail(
            Code::Parse.into(),
            Some("script.sv:3: syntax error".to_owned()),
        );
        assert_eq!(Some("script.sv:3: syntax error"), err.text());
        assert!(err.is(Code::Parse));
        assert!(!err.is_transient());
    }

    #[test]
    fn unknown_status_still_translates() {
        let err = Subsystem::Stream.fail(Status(123_456), None);
        assert_matches!(Error::Stream(_), &err);
        assert_eq!(Some("Error 123456"), err.text());
    }

    #[test]
    fn check_zero_passes() {
        assert!(Subsystem::Url.check(0).is_ok());
        assert_matches!(Err(Error::Url(_)), Subsystem::Url.check(0x1000));
    }

    #[test]
    fn bad_filename_is_fatal() {
        let err = Subsystem::Mailbox.fail(Code::BadFilename.into(), None);
        assert!(!err.is_transient());
    }

    #[test]
    fn errno_transience() {
        let err =
            Subsystem::Stream.fail(nix::errno::Errno::EAGAIN.into(), None);
        assert!(err.is_transient());
        assert_eq!(None, Error::Disposed(HandleKind::Stream).status());
    }
}
