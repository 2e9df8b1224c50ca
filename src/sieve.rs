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

//! Sieve filtering.
//!
//! A machine accumulates diagnostic text while it compiles and runs scripts.
//! Failures of `compile()`, `message()` and `mailbox()` carry that text. Text
//! that nobody collected is a latent failure: `finish()` reports it as an
//! error, and a machine dropped without `finish()` logs it instead, since
//! there is no caller left to report to.

use std::path::Path;

use log::error;

use crate::handle::Handle;
use crate::mailbox::Mailbox;
use crate::message::Message;
use crate::native::{EngineRef, HandleKind};
use crate::support::error::{Error, Result, ResultExt, Subsystem};
use crate::support::status::{Code, Status};

/// One action taken by a running script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SieveAction {
    /// The number of the message acted upon within its mailbox, or 1 for a
    /// standalone message.
    pub msgno: usize,
    /// The name of the action, such as `KEEP` or `DISCARD`.
    pub action: String,
    /// Free-form detail about the action.
    pub text: String,
}

/// A sieve interpreter instance.
///
/// Unlike the other wrappers, a machine has a single owner, so that its
/// latent diagnostics are collected exactly once.
#[derive(Debug)]
pub struct SieveMachine {
    handle: Handle,
    finished: bool,
}

impl SieveMachine {
    pub fn new(engine: &EngineRef) -> Result<Self> {
        let raw = engine
            .sieve_machine_init()
            .or_fail(Subsystem::SieveMachine)?;
        Ok(SieveMachine {
            handle: Handle::acquire(engine, HandleKind::SieveMachine, raw),
            finished: false,
        })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Translates a failed call, attaching whatever the machine had to say
    /// about it.
    fn fail(&self, status: Status) -> Error {
        let text = match self.handle.raw() {
            Ok(raw) => self
                .handle
                .engine()
                .sieve_error_text(raw)
                .unwrap_or_default(),
            Err(_) => String::new(),
        };

        Subsystem::SieveMachine.fail(
            status,
            Some(text.trim_end().to_owned()).filter(|t| !t.is_empty()),
        )
    }

    /// Compiles the script at `path`, which must happen before anything is
    /// run.
    pub fn compile(&self, path: &Path) -> Result<()> {
        self.handle
            .engine()
            .sieve_compile(self.handle.raw()?, path)
            .map_err(|s| self.fail(s))
    }

    /// Runs the compiled script over one message.
    pub fn message(&self, message: &Message) -> Result<()> {
        self.handle
            .engine()
            .sieve_message(self.handle.raw()?, message.handle().raw()?)
            .map_err(|s| self.fail(s))
    }

    /// Runs the compiled script over every message of an open mailbox.
    pub fn mailbox(&self, mailbox: &Mailbox) -> Result<()> {
        self.handle
            .engine()
            .sieve_mailbox(self.handle.raw()?, mailbox.handle().raw()?)
            .map_err(|s| self.fail(s))
    }

    /// A listing of the compiled program.
    pub fn disassemble(&self) -> Result<String> {
        self.handle
            .engine()
            .sieve_disass(self.handle.raw()?)
            .map_err(|s| self.fail(s))
    }

    /// Returns and clears the diagnostic text accumulated so far.
    pub fn error_text(&self) -> Result<String> {
        self.handle
            .engine()
            .sieve_error_text(self.handle.raw()?)
            .or_fail(Subsystem::SieveMachine)
    }

    /// Calls `logger` for every action taken by subsequent runs.
    pub fn set_logger(
        &self,
        logger: impl FnMut(&SieveAction) + Send + 'static,
    ) -> Result<()> {
        self.handle
            .engine()
            .sieve_set_logger(self.handle.raw()?, Box::new(logger))
            .or_fail(Subsystem::SieveMachine)
    }

    /// Destroys the machine, failing if it holds diagnostics nobody
    /// collected.
    ///
    /// The machine is destroyed whatever the outcome.
    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        let latent = self.error_text()?;
        self.handle.dispose()?;

        if latent.trim().is_empty() {
            Ok(())
        } else {
            Err(Subsystem::SieveMachine.fail(
                Code::Failure.into(),
                Some(latent.trim_end().to_owned()),
            ))
        }
    }
}

impl Drop for SieveMachine {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        match self.error_text() {
            Ok(ref text) if !text.trim().is_empty() => error!(
                "Sieve machine destroyed with unreported errors: {}",
                text.trim_end()
            ),
            Ok(_) | Err(Error::Disposed(_)) => (),
            Err(e) => error!("Sieve machine teardown: {}", e),
        }
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::sync::{Arc, Mutex};

    use tempfile::TempDir;

    use super::*;
    use crate::attribute::Flags;
    use crate::native::local;
    use crate::stream::{Stream, StreamFlags};

    fn script(root: &TempDir, name: &str, text: &str) -> std::path::PathBuf {
        let path = root.path().join(name);
        fs::write(&path, text).unwrap();
        path
    }

    fn message(engine: &EngineRef, subject: &str) -> Message {
        let text = format!(
            "Subject: {}\nMessage-ID: <{}@example>\n\nx\n",
            subject, subject
        );
        Stream::memory(engine, text.as_bytes())
            .unwrap()
            .to_message()
            .unwrap()
    }

    #[test]
    fn invalid_script_reports_diagnostics() {
        let root = TempDir::new().unwrap();
        let path = script(&root, "bad.sv", "keep;\nfrobnicate;\n");
        let engine = local::test_engine();
        let machine = SieveMachine::new(&engine).unwrap();

        let err = machine.compile(&path).unwrap_err();
        assert_matches!(Error::SieveMachine(_), &err);
        assert!(err.is(Code::Parse));
        let text = err.text().unwrap();
        assert!(text.contains("bad.sv:2:"), "Unexpected text: {}", text);
        assert!(text.contains("frobnicate"), "Unexpected text: {}", text);

        // The failure consumed the diagnostics
        machine.finish().unwrap();
    }

    #[test]
    fn missing_semicolon() {
        let root = TempDir::new().unwrap();
        let path = script(&root, "semi.sv", "# comment\nkeep\n");
        let engine = local::test_engine();
        let machine = SieveMachine::new(&engine).unwrap();
        let err = machine.compile(&path).unwrap_err();
        assert!(err.text().unwrap().contains("semi.sv:"));
    }

    #[test]
    fn run_before_compile_is_out_of_sequence() {
        let engine = local::test_engine();
        let machine = SieveMachine::new(&engine).unwrap();
        let err = machine.message(&message(&engine, "a")).unwrap_err();
        assert!(err.is(Code::Seq));
    }

    #[test]
    fn discard_marks_deleted_and_logs() {
        let root = TempDir::new().unwrap();
        let path = script(
            &root,
            "discard.sv",
            "require \"comparator-i;octet\";\n\
             /* drop it */ discard;\nstop;\nkeep;\n",
        );
        let engine = local::test_engine();
        let machine = SieveMachine::new(&engine).unwrap();
        machine.compile(&path).unwrap();

        let log = Arc::new(Mutex::new(Vec::new()));
        let log2 = Arc::clone(&log);
        machine
            .set_logger(move |action| log2.lock().unwrap().push(action.clone()))
            .unwrap();

        let msg = message(&engine, "spam");
        machine.message(&msg).unwrap();
        assert!(msg.attribute().unwrap().is_flag(Flags::DELETED).unwrap());

        let log = log.lock().unwrap();
        assert_eq!(1, log.len());
        assert_eq!("DISCARD", log[0].action);
        assert_eq!(1, log[0].msgno);
        drop(log);

        machine.finish().unwrap();
    }

    #[test]
    fn keep_after_discard_wins() {
        let root = TempDir::new().unwrap();
        let path = script(&root, "both.sv", "discard;\nkeep;\n");
        let engine = local::test_engine();
        let machine = SieveMachine::new(&engine).unwrap();
        machine.compile(&path).unwrap();

        let msg = message(&engine, "ham");
        machine.message(&msg).unwrap();
        assert!(!msg.attribute().unwrap().is_flag(Flags::DELETED).unwrap());
        machine.finish().unwrap();
    }

    #[test]
    fn keep_undeletes_message() {
        let root = TempDir::new().unwrap();
        let keep = script(&root, "keep.sv", "keep;\n");
        let empty = script(&root, "empty.sv", "");
        let engine = local::test_engine();
        let msg = message(&engine, "restored");
        let attr = msg.attribute().unwrap();

        // The implicit keep leaves an existing mark in place
        attr.set_flags(Flags::DELETED).unwrap();
        let machine = SieveMachine::new(&engine).unwrap();
        machine.compile(&empty).unwrap();
        machine.message(&msg).unwrap();
        assert!(attr.is_flag(Flags::DELETED).unwrap());

        machine.compile(&keep).unwrap();
        machine.message(&msg).unwrap();
        assert!(!attr.is_flag(Flags::DELETED).unwrap());
        machine.finish().unwrap();
    }

    #[test]
    fn disassembly_lists_program() {
        let root = TempDir::new().unwrap();
        let path = script(&root, "keep.sv", "keep;\n");
        let engine = local::test_engine();
        let machine = SieveMachine::new(&engine).unwrap();
        assert!(machine.disassemble().unwrap_err().is(Code::Seq));
        machine.compile(&path).unwrap();
        let listing = machine.disassemble().unwrap();
        assert!(listing.contains("KEEP"), "Unexpected listing: {}", listing);
    }

    #[test]
    fn latent_errors_surface_at_finish() {
        let root = TempDir::new().unwrap();
        let path = script(&root, "discard.sv", "discard;\n");
        let engine = local::test_engine();

        let mailbox = crate::Mailbox::new(&engine, "memory:sieve-ro").unwrap();
        mailbox.open(StreamFlags::RDWR).unwrap();
        mailbox.append_message(&message(&engine, "one")).unwrap();
        mailbox.close().unwrap();
        mailbox.open(StreamFlags::READ).unwrap();

        let machine = SieveMachine::new(&engine).unwrap();
        machine.compile(&path).unwrap();
        machine.mailbox(&mailbox).unwrap();

        let err = machine.finish().unwrap_err();
        assert_matches!(Error::SieveMachine(_), &err);
        assert!(err.text().unwrap().contains("read-only"));
    }

    #[test]
    fn dropping_with_latent_errors_does_not_panic() {
        let root = TempDir::new().unwrap();
        let path = script(&root, "bad.sv", "nonsense;\n");
        let engine = local::test_engine();
        let machine = SieveMachine::new(&engine).unwrap();
        // Bypass the wrapper so the diagnostics stay in the machine
        let raw = machine.handle().raw().unwrap();
        assert!(engine.sieve_compile(raw, &path).is_err());
        drop(machine);
    }
}
