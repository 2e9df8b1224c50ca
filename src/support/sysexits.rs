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

//! Process exit codes following `sysexits.h`.

use super::error::Error;
use super::status::Code;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Sysexit(pub i32);

pub const EX_OK: Sysexit = Sysexit(0);
pub const EX_USAGE: Sysexit = Sysexit(64);
pub const EX_DATAERR: Sysexit = Sysexit(65);
pub const EX_NOINPUT: Sysexit = Sysexit(66);
pub const EX_UNAVAILABLE: Sysexit = Sysexit(69);
pub const EX_SOFTWARE: Sysexit = Sysexit(70);
pub const EX_IOERR: Sysexit = Sysexit(74);
pub const EX_TEMPFAIL: Sysexit = Sysexit(75);
pub const EX_CONFIG: Sysexit = Sysexit(78);

impl Sysexit {
    pub fn exit(self) -> ! {
        std::process::exit(self.0)
    }

    /// The exit code a command-line tool reports for `err`.
    pub fn for_error(err: &Error) -> Self {
        if err.is_transient() {
            return EX_TEMPFAIL;
        }

        match *err {
            Error::Config(_) => EX_CONFIG,
            Error::Library { .. } => EX_UNAVAILABLE,
            Error::Io(_) => EX_IOERR,
            Error::Disposed(_) => EX_SOFTWARE,
            _ if err.is(Code::Parse) => EX_DATAERR,
            _ if err.status()
                == Some(nix::errno::Errno::EILSEQ.into()) =>
            {
                EX_DATAERR
            }
            _ => EX_SOFTWARE,
        }
    }
}
