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

//! Per-message flags.

use bitflags::bitflags;

use crate::handle::Handle;
use crate::native::HandleKind;
use crate::support::error::{Result, ResultExt, Subsystem};

bitflags! {
    /// The user-visible flags of a message.
    ///
    /// The engine additionally tracks whether a message has been modified
    /// since it was last synchronised. That state is not one of these flags
    /// and is only reachable through the `*_modified` methods of `Attribute`.
    pub struct Flags: u32 {
        const ANSWERED = 0x01;
        const FLAGGED = 0x02;
        const DELETED = 0x04;
        const DRAFT = 0x08;
        const SEEN = 0x10;
        const READ = 0x20;
    }
}

/// The flags of one message.
#[derive(Clone, Debug)]
pub struct Attribute {
    handle: Handle,
}

impl Attribute {
    pub fn from_handle(handle: Handle) -> Self {
        debug_assert_eq!(HandleKind::Attribute, handle.kind());
        Attribute { handle }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn flags(&self) -> Result<Flags> {
        self.handle
            .engine()
            .attribute_flags(self.handle.raw()?)
            .or_fail(Subsystem::Message)
    }

    /// Whether every flag in `flags` is set.
    pub fn is_flag(&self, flags: Flags) -> Result<bool> {
        Ok(self.flags()?.contains(flags))
    }

    pub fn set_flags(&self, flags: Flags) -> Result<()> {
        self.handle
            .engine()
            .attribute_set_flags(self.handle.raw()?, flags)
            .or_fail(Subsystem::Message)
    }

    pub fn unset_flags(&self, flags: Flags) -> Result<()> {
        self.handle
            .engine()
            .attribute_unset_flags(self.handle.raw()?, flags)
            .or_fail(Subsystem::Message)
    }

    pub fn is_modified(&self) -> Result<bool> {
        self.handle
            .engine()
            .attribute_is_modified(self.handle.raw()?)
            .or_fail(Subsystem::Message)
    }

    pub fn set_modified(&self) -> Result<()> {
        self.handle
            .engine()
            .attribute_set_modified(self.handle.raw()?)
            .or_fail(Subsystem::Message)
    }

    pub fn clear_modified(&self) -> Result<()> {
        self.handle
            .engine()
            .attribute_clear_modified(self.handle.raw()?)
            .or_fail(Subsystem::Message)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::native::local;
    use crate::stream::Stream;

    fn attribute() -> Attribute {
        let engine = local::test_engine();
        Stream::memory(&engine, b"Subject: x\n\nbody\n")
            .unwrap()
            .to_message()
            .unwrap()
            .attribute()
            .unwrap()
    }

    #[test]
    fn set_and_unset_round_trip() {
        let attr = attribute();
        assert_eq!(Flags::empty(), attr.flags().unwrap());

        attr.set_flags(Flags::SEEN | Flags::FLAGGED).unwrap();
        assert!(attr.is_flag(Flags::SEEN).unwrap());
        assert!(attr.is_flag(Flags::SEEN | Flags::FLAGGED).unwrap());
        assert!(!attr.is_flag(Flags::SEEN | Flags::DELETED).unwrap());

        attr.unset_flags(Flags::SEEN).unwrap();
        assert!(!attr.is_flag(Flags::SEEN).unwrap());
        assert!(attr.is_flag(Flags::FLAGGED).unwrap());
    }

    #[test]
    fn modified_is_independent_of_user_flags() {
        let attr = attribute();
        assert!(!attr.is_modified().unwrap());

        attr.set_flags(Flags::ANSWERED).unwrap();
        attr.unset_flags(Flags::ANSWERED).unwrap();
        assert!(!attr.is_modified().unwrap());

        attr.set_modified().unwrap();
        attr.set_flags(Flags::all()).unwrap();
        attr.unset_flags(Flags::all()).unwrap();
        assert!(attr.is_modified().unwrap());
        assert_eq!(Flags::empty(), attr.flags().unwrap());

        attr.clear_modified().unwrap();
        assert!(!attr.is_modified().unwrap());
    }

    #[test]
    fn attribute_keeps_message_alive() {
        let attr = attribute();
        assert!(!attr.handle().is_owner());
        attr.set_flags(Flags::DRAFT).unwrap();
        assert!(attr.is_flag(Flags::DRAFT).unwrap());
    }
}
