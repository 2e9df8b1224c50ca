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

//! Address lists and mail transports.

use std::io::Write;
use std::process::{Command, Stdio};

use log::{debug, info};

use super::store::{header_value, MessageObj};
use super::stream::{exit_status, spawn};
use crate::native::Outcome;
use crate::support::status::{Code, Status};

/// One entry of an address list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct Addr {
    /// The entry as written, surrounding whitespace removed.
    pub(super) text: String,
    /// The bare `local@domain` part.
    pub(super) email: String,
}

/// Splits `text` at commas which are neither quoted nor inside `<...>`.
fn split_list(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;
    let mut angle = 0u32;

    for (ix, ch) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }

        match ch {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            '<' if !quoted => angle += 1,
            '>' if !quoted => angle = angle.saturating_sub(1),
            ',' if !quoted && 0 == angle => {
                parts.push(&text[start..ix]);
                start = ix + 1;
            },
            _ => (),
        }
    }
    parts.push(&text[start..]);
    parts
}

fn is_valid_email(email: &str) -> bool {
    match email.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(|c| c.is_whitespace() || c.is_control())
        },
        None => false,
    }
}

/// Parses a comma-separated address list.
pub(super) fn parse_addresses(text: &str) -> Outcome<Vec<Addr>> {
    let mut addrs = Vec::new();
    for part in split_list(text) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let email = match (part.rfind('<'), part.rfind('>')) {
            (Some(open), Some(close)) if open < close => &part[open + 1..close],
            _ => part,
        }
        .trim();

        if !is_valid_email(email) {
            return Err(Code::InvalidEmail.into());
        }

        addrs.push(Addr {
            text: part.to_owned(),
            email: email.to_owned(),
        });
    }

    if addrs.is_empty() {
        Err(Code::EmptyAddress.into())
    } else {
        Ok(addrs)
    }
}

pub(super) fn addresses_to_string(addrs: &[Addr]) -> String {
    addrs
        .iter()
        .map(|a| a.text.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A message handed to a `memory:` mailer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub from: String,
    pub to: Vec<String>,
    pub content: Vec<u8>,
}

#[derive(Clone, Debug)]
pub(super) enum Transport {
    Memory,
    Program(String),
}

pub(super) struct MailerObj {
    pub(super) transport: Transport,
    pub(super) open: bool,
}

impl MailerObj {
    pub(super) fn parse(url: &str) -> Outcome<Self> {
        let transport = if url.starts_with("memory:") {
            Transport::Memory
        } else if let Some(command) = url.strip_prefix("prog:") {
            let command = command.trim();
            if command.is_empty() {
                return Err(Code::UrlMissParts.into());
            }
            Transport::Program(command.to_owned())
        } else {
            return Err(Code::MailerBadUrl.into());
        };

        Ok(MailerObj {
            transport,
            open: false,
        })
    }
}

/// Works out the envelope of `msg`, falling back on its headers where the
/// caller supplied nothing.
pub(super) fn envelope(
    msg: &MessageObj,
    from: Option<&[Addr]>,
    to: Option<&[Addr]>,
) -> Outcome<(String, Vec<String>)> {
    let from = match from {
        Some(addrs) => addrs.first().map(|a| a.email.clone()),
        None => header_value(&msg.content, "From")
            .and_then(|h| parse_addresses(&h).ok())
            .and_then(|addrs| addrs.into_iter().next())
            .map(|a| a.email),
    }
    .ok_or_else(|| Status::from(Code::MailerBadFrom))?;

    let to = match to {
        Some(addrs) => addrs.iter().map(|a| a.email.clone()).collect(),
        None => {
            let mut rcpts = Vec::new();
            for field in &["To", "Cc"] {
                if let Some(value) = header_value(&msg.content, field) {
                    let addrs = parse_addresses(&value)
                        .map_err(|_| Status::from(Code::MailerBadTo))?;
                    rcpts.extend(addrs.into_iter().map(|a| a.email));
                }
            }
            rcpts
        },
    };

    if to.is_empty() {
        return Err(Code::MailerNoRcptTo.into());
    }

    Ok((from, to))
}

/// Feeds `content` to `command`, with the recipients as arguments.
pub(super) fn run_program(
    command: &str,
    to: &[String],
    content: &[u8],
) -> Outcome<()> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(format!("{} \"$@\"", command))
        .arg("sh")
        .args(to)
        .stdin(Stdio::piped())
        .stdout(Stdio::null());

    let mut child = spawn(cmd)?;
    debug!("Delivering {} bytes through {:?}", content.len(), command);
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(content) {
            info!("{:?} stopped reading its input: {}", command, e);
        }
    }

    exit_status(child.wait().map_err(|e| Status::from_io(&e))?)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn list_splitting() {
        assert_eq!(
            vec!["\"Doe, Jane\" <jane@example.com>", " bob@example.org"],
            split_list("\"Doe, Jane\" <jane@example.com>, bob@example.org")
        );
        assert_eq!(
            vec!["<a,b@example.com>"],
            split_list("<a,b@example.com>")
        );
        assert_eq!(
            vec!["\"q\\\", x\" <q@example.com>"],
            split_list("\"q\\\", x\" <q@example.com>")
        );
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@b"));
        assert!(!is_valid_email("@b"));
        assert!(!is_valid_email("a@"));
        assert!(!is_valid_email("a b@c"));
        assert!(!is_valid_email("plain"));
    }

    #[test]
    fn mailer_urls() {
        assert!(matches!(
            MailerObj::parse("memory:").map(|m| m.transport),
            Ok(Transport::Memory)
        ));
        assert!(matches!(
            MailerObj::parse("prog: /usr/sbin/sendmail -t")
                .map(|m| m.transport),
            Ok(Transport::Program(ref c)) if "/usr/sbin/sendmail -t" == c
        ));
        assert_eq!(
            Some(Code::UrlMissParts),
            MailerObj::parse("prog:").err().and_then(Status::code)
        );
        assert_eq!(
            Some(Code::MailerBadUrl),
            MailerObj::parse("smtp://localhost").err().and_then(Status::code)
        );
    }
}
