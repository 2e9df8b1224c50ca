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

//! Individual messages.

use crate::attribute::Attribute;
use crate::handle::Handle;
use crate::native::HandleKind;
use crate::stream::Stream;
use crate::support::error::{Result, ResultExt, Subsystem};

/// One message, either standalone (from `Stream::to_message`) or part of a
/// mailbox.
///
/// A message taken from a mailbox keeps the mailbox alive.
#[derive(Clone, Debug)]
pub struct Message {
    handle: Handle,
}

impl Message {
    pub fn from_handle(handle: Handle) -> Self {
        debug_assert_eq!(HandleKind::Message, handle.kind());
        Message { handle }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// The size of the raw message in bytes.
    pub fn size(&self) -> Result<usize> {
        self.handle
            .engine()
            .message_size(self.handle.raw()?)
            .or_fail(Subsystem::Message)
    }

    pub fn lines(&self) -> Result<usize> {
        self.handle
            .engine()
            .message_lines(self.handle.raw()?)
            .or_fail(Subsystem::Message)
    }

    pub fn attribute(&self) -> Result<Attribute> {
        let raw = self
            .handle
            .engine()
            .message_attribute(self.handle.raw()?)
            .or_fail(Subsystem::Message)?;
        Ok(Attribute::from_handle(Handle::borrow(
            self.handle.engine_ref(),
            HandleKind::Attribute,
            raw,
            Some(&self.handle),
        )))
    }

    /// Opens a new stream over the raw message.
    pub fn stream(&self) -> Result<Stream> {
        let raw = self
            .handle
            .engine()
            .message_stream(self.handle.raw()?)
            .or_fail(Subsystem::Message)?;
        let stream = Stream::from_handle(Handle::acquire(
            self.handle.engine_ref(),
            HandleKind::Stream,
            raw,
        ));
        stream.open()?;
        Ok(stream)
    }

    /// The unfolded value of the first header called `name`.
    ///
    /// Fails with `MU_ERR_NOENT` if there is no such header.
    pub fn header_value(&self, name: &str) -> Result<String> {
        self.handle
            .engine()
            .message_header_value(self.handle.raw()?, name)
            .or_fail(Subsystem::Header)
    }

    /// Tears the message down immediately, on behalf of every clone.
    pub fn dispose(&self) -> Result<()> {
        self.handle.dispose()
    }
}
