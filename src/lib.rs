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

//! Safe wrappers over a mail-processing engine.
//!
//! The engine owns every mailbox, message, stream, mailer and sieve machine;
//! this crate only holds opaque handles to those resources (see `handle`),
//! checks the status of every call across the `native::Engine` boundary, and
//! shapes the engine's enumerate-by-index and read-a-chunk primitives into
//! iterators and `std::io` streams.
//!
//! `native::local::LocalEngine` is an in-process engine that implements the
//! boundary on top of the standard library. `native::connect` picks the engine
//! named by the configuration.

#[cfg(test)]
macro_rules! assert_matches {
    ($expected:pat, $actual:expr) => {
        match $actual {
            $expected => (),
            unexpected => panic!(
                "Expected {} matches {}, got {:?}",
                stringify!($expected),
                stringify!($actual),
                unexpected
            ),
        }
    };
}

pub mod address;
pub mod attribute;
pub mod filter;
pub mod handle;
pub mod mailbox;
pub mod mailcap;
pub mod mailer;
pub mod message;
pub mod native;
pub mod sieve;
pub mod stream;
pub mod support;

pub use crate::address::{Address, AddressArg};
pub use crate::attribute::{Attribute, Flags};
pub use crate::filter::{FallbackMode, FilterStream};
pub use crate::handle::Handle;
pub use crate::mailbox::{Debug, Folder, Mailbox, Url};
pub use crate::mailcap::{Mailcap, MailcapEntry};
pub use crate::mailer::Mailer;
pub use crate::message::Message;
pub use crate::native::{Engine, EngineRef, HandleKind, RawHandle};
pub use crate::sieve::{SieveAction, SieveMachine};
pub use crate::stream::{Stream, StreamFlags, WaitFlags};
pub use crate::support::config::Config;
pub use crate::support::error::{Error, Failure, Result, Subsystem};
pub use crate::support::status::{Code, Status};

#[cfg(test)]
static INIT_TEST_LOG: std::sync::Once = std::sync::Once::new();

#[cfg(test)]
fn init_test_log() {
    INIT_TEST_LOG.call_once(|| {
        use log4rs::append::console::{ConsoleAppender, Target};
        use log4rs::config::{Appender, Config, Root};
        use log4rs::encode::pattern::PatternEncoder;

        let stderr = ConsoleAppender::builder()
            .target(Target::Stderr)
            .encoder(Box::new(PatternEncoder::new(
                "{d(%H:%M:%S%.3f)} [{l}][{t}] {m}{n}",
            )))
            .build();
        let config = Config::builder()
            .appender(Appender::builder().build("stderr", Box::new(stderr)))
            .build(
                Root::builder()
                    .appender("stderr")
                    .build(log::LevelFilter::Debug),
            )
            .unwrap();
        // Another test harness may have installed a logger already
        let _ = log4rs::init_config(config);
    })
}
