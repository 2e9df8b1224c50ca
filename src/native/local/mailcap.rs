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

//! Mailcap (RFC 1524) parsing.

use crate::native::Outcome;
use crate::support::status::Code;

/// Joins backslash-continued lines, dropping comments and blank lines.
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if let Some(head) = line.strip_suffix('\\') {
            current.push_str(head);
            continue;
        }
        current.push_str(line);

        let trimmed = current.trim();
        if !trimmed.is_empty() && !trimmed.starts_with('#') {
            lines.push(trimmed.to_owned());
        }
        current.clear();
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() && !trimmed.starts_with('#') {
        lines.push(trimmed.to_owned());
    }
    lines
}

/// Splits a record at semicolons not preceded by a backslash.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if Some(&';') == chars.peek() => {
                field.push(';');
                chars.next();
            },
            ';' => {
                fields.push(field.trim().to_owned());
                field.clear();
            },
            ch => field.push(ch),
        }
    }

    let last = field.trim();
    if !last.is_empty() {
        fields.push(last.to_owned());
    }
    fields
}

/// Parses a whole mailcap file into its records.
pub(super) fn parse(content: &[u8]) -> Outcome<Vec<Vec<String>>> {
    let text = String::from_utf8_lossy(content);
    logical_lines(&text)
        .iter()
        .map(|line| {
            let fields = split_fields(line);
            if fields.len() < 2 || fields[0].is_empty() {
                Err(Code::Parse.into())
            } else {
                Ok(fields)
            }
        })
        .collect()
}
