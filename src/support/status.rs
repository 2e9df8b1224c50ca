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

//! The engine's status-code space.
//!
//! Every native call reports an integer status. Zero is success. Values below
//! `MU_ERR_BASE` are operating-system `errno` values; values from
//! `MU_ERR_BASE` upwards are the engine's own codes, enumerated by `Code`.

use std::borrow::Cow;
use std::fmt;

/// First status value owned by the engine rather than the operating system.
pub const MU_ERR_BASE: i32 = 0x1000;

/// A raw status as returned across the native boundary.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Status(pub i32);

macro_rules! status_codes {
    ($($name:ident = $offset:literal, $sym:expr, $desc:expr;)*) => {
        /// The engine-specific status codes.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum Code {
            $($name = MU_ERR_BASE + $offset,)*
        }

        impl Code {
            /// All codes, in numeric order.
            pub const ALL: &'static [Code] = &[$(Code::$name,)*];

            /// Returns the code for the given raw value, if it is one.
            pub fn from_raw(raw: i32) -> Option<Self> {
                match raw.wrapping_sub(MU_ERR_BASE) {
                    $($offset => Some(Code::$name),)*
                    _ => None,
                }
            }

            /// Returns the C-level symbolic name, e.g. `MU_ERR_LOCK_CONFLICT`.
            pub fn symbol(self) -> &'static str {
                match self {
                    $(Code::$name => $sym,)*
                }
            }

            /// Returns the human-readable description.
            pub fn description(self) -> &'static str {
                match self {
                    $(Code::$name => $desc,)*
                }
            }
        }
    };
}

status_codes! {
    Failure = 0, "MU_ERR_FAILURE", "Operation failed";
    Canceled = 1, "MU_ERR_CANCELED", "Operation canceled";
    EmptyVfn = 2, "MU_ERR_EMPTY_VFN", "Empty virtual function";
    OutPtrNull = 3, "MU_ERR_OUT_PTR_NULL", "Null output pointer";
    MbxRemoved = 4, "MU_ERR_MBX_REMOVED", "Mailbox removed";
    NotOpen = 5, "MU_ERR_NOT_OPEN", "Resource not open";
    Open = 6, "MU_ERR_OPEN", "Resource is already open";
    InvalidEmail = 7, "MU_ERR_INVALID_EMAIL", "Malformed email address";
    EmptyAddress = 8, "MU_ERR_EMPTY_ADDRESS", "Empty address list";
    LockerNull = 9, "MU_ERR_LOCKER_NULL", "Locker null";
    LockConflict = 10, "MU_ERR_LOCK_CONFLICT",
        "Conflict with previous locker";
    LockBadLock = 11, "MU_ERR_LOCK_BAD_LOCK", "Lock file check failed";
    LockBadFile = 12, "MU_ERR_LOCK_BAD_FILE", "File check failed";
    LockNotHeld = 13, "MU_ERR_LOCK_NOT_HELD", "Lock not held on file";
    LockExtFail = 14, "MU_ERR_LOCK_EXT_FAIL",
        "Failed to execute external locker";
    LockExtErr = 15, "MU_ERR_LOCK_EXT_ERR", "External locker failed";
    LockExtKilled = 16, "MU_ERR_LOCK_EXT_KILLED", "External locker killed";
    NoSuchUser = 17, "MU_ERR_NO_SUCH_USER", "No such user name";
    GetHostByName = 18, "MU_ERR_GETHOSTBYNAME", "DNS name resolution failed";
    MailerBadFrom = 19, "MU_ERR_MAILER_BAD_FROM",
        "Not a valid sender address";
    MailerBadTo = 20, "MU_ERR_MAILER_BAD_TO",
        "Not a valid recipient address";
    MailerNoRcptTo = 21, "MU_ERR_MAILER_NO_RCPT_TO",
        "No recipient addresses found";
    MailerBadUrl = 22, "MU_ERR_MAILER_BAD_URL",
        "Malformed or unsupported mailer URL";
    SmtpRcptFailed = 23, "MU_ERR_SMTP_RCPT_FAILED", "SMTP RCPT command failed";
    TcpNoHost = 24, "MU_ERR_TCP_NO_HOST",
        "Required host specification is missing";
    TcpNoPort = 25, "MU_ERR_TCP_NO_PORT",
        "Invalid port or service specification";
    Bad2047Input = 26, "MU_ERR_BAD_2047_INPUT",
        "Input string is not RFC 2047 encoded";
    Bad2047Encoding = 27, "MU_ERR_BAD_2047_ENCODING",
        "Not a valid RFC 2047 encoding";
    NoUserName = 28, "MU_ERR_NOUSERNAME", "User name is not supplied";
    NoPassword = 29, "MU_ERR_NOPASSWORD", "User password is not supplied";
    BadReply = 30, "MU_ERR_BADREPLY", "Invalid reply from the remote host";
    Seq = 31, "MU_ERR_SEQ", "Bad command sequence";
    Reply = 32, "MU_ERR_REPLY", "Operation rejected by remote party";
    BadAuthScheme = 33, "MU_ERR_BAD_AUTH_SCHEME",
        "Unsupported authentication scheme";
    AuthFailure = 34, "MU_ERR_AUTH_FAILURE", "Authentication failed";
    ProcessNoExec = 35, "MU_ERR_PROCESS_NOEXEC", "Cannot execute";
    ProcessExited = 36, "MU_ERR_PROCESS_EXITED",
        "Process exited with a non-zero status";
    ProcessSignaled = 37, "MU_ERR_PROCESS_SIGNALED",
        "Process exited on signal";
    ProcessUnknownFailure = 38, "MU_ERR_PROCESS_UNKNOWN_FAILURE",
        "Unknown failure while executing subprocess";
    ConnClosed = 39, "MU_ERR_CONN_CLOSED", "Connection closed by remote host";
    Parse = 40, "MU_ERR_PARSE", "Parse error";
    NoEnt = 41, "MU_ERR_NOENT", "Requested item not found";
    Exists = 42, "MU_ERR_EXISTS", "Item already exists";
    BufSpace = 43, "MU_ERR_BUFSPACE", "Not enough buffer space";
    Sql = 44, "MU_ERR_SQL", "SQL error";
    DbAlreadyConnected = 45, "MU_ERR_DB_ALREADY_CONNECTED",
        "Already connected to the database";
    DbNotConnected = 46, "MU_ERR_DB_NOT_CONNECTED",
        "Not connected to the database";
    ResultNotReleased = 47, "MU_ERR_RESULT_NOT_RELEASED",
        "Result of the previous query is not released";
    NoQuery = 48, "MU_ERR_NO_QUERY", "No query was yet executed";
    BadColumn = 49, "MU_ERR_BAD_COLUMN", "Bad column address";
    NoResult = 50, "MU_ERR_NO_RESULT",
        "No result from the previous query available";
    NoInterface = 51, "MU_ERR_NO_INTERFACE", "No such interface";
    BadOp = 52, "MU_ERR_BADOP", "Inappropriate operation for this mode";
    BadFilename = 53, "MU_ERR_BAD_FILENAME",
        "Badly formed file or directory name";
    Read = 54, "MU_ERR_READ", "Read error";
    NoTransport = 55, "MU_ERR_NO_TRANSPORT", "Transport stream not set";
    AuthNoCred = 56, "MU_ERR_AUTH_NO_CRED", "No credentials supplied";
    UrlMissParts = 57, "MU_ERR_URL_MISS_PARTS", "URL missing required parts";
    UrlExtraParts = 58, "MU_ERR_URL_EXTRA_PARTS",
        "URL has parts not allowed by its scheme";
    UrlInvalidParameter = 59, "MU_ERR_URL_INVALID_PARAMETER",
        "Invalid parameter in URL";
    InfoUnavailable = 60, "MU_ERR_INFO_UNAVAILABLE",
        "Information is not yet available";
    NoName = 61, "MU_ERR_NONAME", "Name or service not known";
    BadFlags = 62, "MU_ERR_BADFLAGS", "Bad value for flags";
    SockType = 63, "MU_ERR_SOCKTYPE", "Socket type not supported";
    Family = 64, "MU_ERR_FAMILY", "Address family not supported";
    Service = 65, "MU_ERR_SERVICE", "Requested service not supported";
    PermOwnerMismatch = 66, "MU_ERR_PERM_OWNER_MISMATCH",
        "File owner mismatch";
    PermGroupWritable = 67, "MU_ERR_PERM_GROUP_WRITABLE",
        "Group writable file";
    PermWorldWritable = 68, "MU_ERR_PERM_WORLD_WRITABLE",
        "World writable file";
    PermGroupReadable = 69, "MU_ERR_PERM_GROUP_READABLE",
        "Group readable file";
    PermWorldReadable = 70, "MU_ERR_PERM_WORLD_READABLE",
        "World readable file";
    PermLinkedWrdir = 71, "MU_ERR_PERM_LINKED_WRDIR",
        "Linked file in a writable directory";
    PermDirIwgrp = 72, "MU_ERR_PERM_DIR_IWGRP",
        "File in group writable directory";
    PermDirIwoth = 73, "MU_ERR_PERM_DIR_IWOTH",
        "File in world writable directory";
    Disabled = 74, "MU_ERR_DISABLED",
        "Requested feature disabled in configuration";
    Format = 75, "MU_ERR_FORMAT", "Error in format string";
}

impl Status {
    pub const OK: Status = Status(0);

    pub fn is_ok(self) -> bool {
        0 == self.0
    }

    /// Returns the engine code this status denotes, if any.
    ///
    /// `None` for success, for `errno` values, and for values outside the
    /// known code space.
    pub fn code(self) -> Option<Code> {
        Code::from_raw(self.0)
    }

    /// Returns the status for an operating-system error, falling back to a
    /// generic failure when the error carries no `errno`.
    pub fn from_io(e: &std::io::Error) -> Self {
        e.raw_os_error()
            .filter(|&errno| errno > 0 && errno < MU_ERR_BASE)
            .map(Status)
            .unwrap_or_else(|| Code::Failure.into())
    }

    /// Returns a human-readable description of this status.
    ///
    /// This is total: unknown values describe themselves as `Error <n>`.
    pub fn description(self) -> Cow<'static, str> {
        if self.is_ok() {
            return Cow::Borrowed("Success");
        }

        if let Some(code) = self.code() {
            return Cow::Borrowed(code.description());
        }

        if self.0 > 0 && self.0 < MU_ERR_BASE {
            let errno = nix::errno::Errno::from_i32(self.0);
            if nix::errno::Errno::UnknownErrno != errno {
                return Cow::Borrowed(errno.desc());
            }
        }

        Cow::Owned(format!("Error {}", self.0))
    }
}

impl From<Code> for Status {
    fn from(code: Code) -> Self {
        Status(code as i32)
    }
}

impl From<nix::errno::Errno> for Status {
    fn from(errno: nix::errno::Errno) -> Self {
        Status(errno as i32)
    }
}

impl PartialEq<Code> for Status {
    fn eq(&self, code: &Code) -> bool {
        self.0 == *code as i32
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.code() {
            Some(code) => write!(f, "Status({})", code.symbol()),
            None => write!(f, "Status({})", self.0),
        }
    }
}
