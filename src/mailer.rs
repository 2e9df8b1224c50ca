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

//! Sending messages.

use log::debug;

use crate::address::AddressArg;
use crate::handle::Handle;
use crate::message::Message;
use crate::native::{EngineRef, HandleKind};
use crate::stream::StreamFlags;
use crate::support::error::{Result, ResultExt, Subsystem};

/// A mail transport.
///
/// A mailer starts out closed; `send_message()` is only valid between
/// `open()` and `close()`.
#[derive(Clone, Debug)]
pub struct Mailer {
    handle: Handle,
}

impl Mailer {
    pub fn new(engine: &EngineRef, url: &str) -> Result<Self> {
        let raw = engine.mailer_create(url).or_fail(Subsystem::Mailer)?;
        Ok(Mailer::from_handle(Handle::acquire(
            engine,
            HandleKind::Mailer,
            raw,
        )))
    }

    pub fn from_handle(handle: Handle) -> Self {
        debug_assert_eq!(HandleKind::Mailer, handle.kind());
        Mailer { handle }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn open(&self, flags: StreamFlags) -> Result<()> {
        debug!("Opening {:?}", self.handle);
        self.handle
            .engine()
            .mailer_open(self.handle.raw()?, flags)
            .or_fail(Subsystem::Mailer)
    }

    pub fn close(&self) -> Result<()> {
        debug!("Closing {:?}", self.handle);
        self.handle
            .engine()
            .mailer_close(self.handle.raw()?)
            .or_fail(Subsystem::Mailer)
    }

    /// Sends `message`.
    ///
    /// A missing sender or recipient list is taken from the message's `From`
    /// or `To` header respectively. Failing that, the send fails with
    /// `MU_ERR_MAILER_BAD_FROM` or `MU_ERR_MAILER_NO_RCPT_TO`.
    pub fn send_message(
        &self,
        message: &Message,
        from: Option<AddressArg<'_>>,
        to: Option<AddressArg<'_>>,
    ) -> Result<()> {
        let engine = self.handle.engine_ref();
        let from = from.map(|a| a.resolve(engine)).transpose()?;
        let to = to.map(|a| a.resolve(engine)).transpose()?;

        let from_raw = match from {
            Some(ref a) => Some(a.handle().raw()?),
            None => None,
        };
        let to_raw = match to {
            Some(ref a) => Some(a.handle().raw()?),
            None => None,
        };

        self.handle
            .engine()
            .mailer_send_message(
                self.handle.raw()?,
                message.handle().raw()?,
                from_raw,
                to_raw,
            )
            .or_fail(Subsystem::Mailer)
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::address::Address;
    use crate::native::local::LocalEngine;
    use crate::stream::Stream;
    use crate::support::config::Config;
    use crate::support::error::Error;
    use crate::support::status::Code;

    fn setup() -> (Arc<LocalEngine>, EngineRef) {
        crate::init_test_log();
        let local = Arc::new(LocalEngine::new(&Config::default()));
        let engine: EngineRef = local.clone();
        (local, engine)
    }

    fn message(engine: &EngineRef, headers: &str) -> Message {
        Stream::memory(engine, format!("{}\nbody\n", headers).as_bytes())
            .unwrap()
            .to_message()
            .unwrap()
    }

    #[test]
    fn explicit_envelope() {
        let (local, engine) = setup();
        let mailer = Mailer::new(&engine, "memory:").unwrap();
        mailer.open(StreamFlags::empty()).unwrap();

        let to = Address::parse(&engine, "x@example.com, y@example.com")
            .unwrap();
        let msg = message(&engine, "Subject: hi\n");
        mailer
            .send_message(
                &msg,
                Some("sender@example.com".into()),
                Some((&to).into()),
            )
            .unwrap();

        let outbox = local.outbox();
        assert_eq!(1, outbox.len());
        assert_eq!("sender@example.com", outbox[0].from);
        assert_eq!(vec!["x@example.com", "y@example.com"], outbox[0].to);
        assert_eq!(b"Subject: hi\n\nbody\n".to_vec(), outbox[0].content);
    }

    #[test]
    fn envelope_from_headers() {
        let (local, engine) = setup();
        let mailer = Mailer::new(&engine, "memory:").unwrap();
        mailer.open(StreamFlags::empty()).unwrap();

        let msg = message(
            &engine,
            "From: Alice <alice@example.com>\nTo: bob@example.com\n",
        );
        mailer.send_message(&msg, None, None).unwrap();
        let outbox = local.outbox();
        assert_eq!("alice@example.com", outbox[0].from);
        assert_eq!(vec!["bob@example.com"], outbox[0].to);
    }

    #[test]
    fn missing_envelope_fails() {
        let (_, engine) = setup();
        let mailer = Mailer::new(&engine, "memory:").unwrap();
        mailer.open(StreamFlags::empty()).unwrap();

        let msg = message(&engine, "Subject: nobody\n");
        let err = mailer.send_message(&msg, None, None).unwrap_err();
        assert_matches!(Error::Mailer(_), &err);
        assert!(err.is(Code::MailerBadFrom));

        let err = mailer
            .send_message(&msg, Some("a@example.com".into()), None)
            .unwrap_err();
        assert!(err.is(Code::MailerNoRcptTo));
    }

    #[test]
    fn send_requires_open() {
        let (_, engine) = setup();
        let mailer = Mailer::new(&engine, "memory:").unwrap();
        let msg = message(&engine, "From: a@example.com\nTo: b@example.com\n");
        assert!(mailer
            .send_message(&msg, None, None)
            .unwrap_err()
            .is(Code::NotOpen));

        mailer.open(StreamFlags::empty()).unwrap();
        mailer.send_message(&msg, None, None).unwrap();
        mailer.close().unwrap();
        assert!(mailer
            .send_message(&msg, None, None)
            .unwrap_err()
            .is(Code::NotOpen));
    }

    #[test]
    fn bad_url() {
        let (_, engine) = setup();
        assert!(Mailer::new(&engine, "carrier-pigeon://coop")
            .unwrap_err()
            .is(Code::MailerBadUrl));
    }

    #[test]
    fn program_mailer_pipes_message() {
        let (_, engine) = setup();
        let root = TempDir::new().unwrap();
        let out = root.path().join("out");
        let script = root.path().join("deliver");
        fs::write(
            &script,
            format!(
                "#!/bin/sh\ncat > '{}'\necho \"$@\" >> '{}'\n",
                out.display(),
                out.display()
            ),
        )
        .unwrap();
        let mailer = Mailer::new(
            &engine,
            &format!("prog:sh {}", script.display()),
        )
        .unwrap();
        mailer.open(StreamFlags::empty()).unwrap();
        let msg = message(&engine, "From: a@example.com\n");
        mailer
            .send_message(&msg, None, Some("r@example.com".into()))
            .unwrap();
        mailer.close().unwrap();

        assert_eq!(
            "From: a@example.com\n\nbody\nr@example.com\n",
            fs::read_to_string(&out).unwrap()
        );
    }
}
