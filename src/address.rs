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

//! Address lists.

use std::fmt;

use crate::handle::Handle;
use crate::native::{EngineRef, HandleKind};
use crate::support::error::{Result, ResultExt, Subsystem};

/// A parsed list of one or more email addresses.
#[derive(Clone, Debug)]
pub struct Address {
    handle: Handle,
}

impl Address {
    /// Parses a comma-separated address list.
    pub fn parse(engine: &EngineRef, text: &str) -> Result<Self> {
        let raw = engine.address_create(text).or_fail(Subsystem::Address)?;
        Ok(Address::from_handle(Handle::acquire(
            engine,
            HandleKind::Address,
            raw,
        )))
    }

    pub fn from_handle(handle: Handle) -> Self {
        debug_assert_eq!(HandleKind::Address, handle.kind());
        Address { handle }
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn count(&self) -> Result<usize> {
        self.handle
            .engine()
            .address_count(self.handle.raw()?)
            .or_fail(Subsystem::Address)
    }

    /// The bare email of address number `no`, counting from 1.
    pub fn email(&self, no: usize) -> Result<String> {
        self.handle
            .engine()
            .address_email(self.handle.raw()?, no)
            .or_fail(Subsystem::Address)
    }

    pub fn emails(&self) -> Result<Vec<String>> {
        (1..=self.count()?).map(|no| self.email(no)).collect()
    }

    /// The whole list, formatted as a header value.
    pub fn to_text(&self) -> Result<String> {
        self.handle
            .engine()
            .address_to_string(self.handle.raw()?)
            .or_fail(Subsystem::Address)
    }
}

/// An address given either as text or as a parsed `Address`.
#[derive(Clone, Copy, Debug)]
pub enum AddressArg<'a> {
    Text(&'a str),
    Address(&'a Address),
}

impl<'a> AddressArg<'a> {
    /// Brings the argument into the parsed form the engine takes.
    pub fn resolve(self, engine: &EngineRef) -> Result<Address> {
        match self {
            AddressArg::Text(text) => Address::parse(engine, text),
            AddressArg::Address(address) => Ok(address.clone()),
        }
    }
}

impl<'a> From<&'a str> for AddressArg<'a> {
    fn from(text: &'a str) -> Self {
        AddressArg::Text(text)
    }
}

impl<'a> From<&'a String> for AddressArg<'a> {
    fn from(text: &'a String) -> Self {
        AddressArg::Text(text)
    }
}

impl<'a> From<&'a Address> for AddressArg<'a> {
    fn from(address: &'a Address) -> Self {
        AddressArg::Address(address)
    }
}

impl<'a> fmt::Display for AddressArg<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            AddressArg::Text(text) => f.write_str(text),
            AddressArg::Address(address) => match address.to_text() {
                Ok(text) => f.write_str(&text),
                Err(_) => write!(f, "{:?}", address.handle()),
            },
        }
    }
}
