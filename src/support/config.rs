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

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::Result;
use crate::filter::FallbackMode;

/// The configuration for the wrapper and its local engine.
///
/// Every section may be omitted, in which case its defaults apply.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Options for character-set conversion streams.
    #[serde(default)]
    pub iconv: IconvConfig,

    /// Options relating to mailboxes.
    #[serde(default)]
    pub mailbox: MailboxConfig,

    /// Which engine to connect to.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Where logging is configured.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct IconvConfig {
    /// What to do with input that cannot be converted.
    ///
    /// One of `none` (fail with `EILSEQ`), `copy-pass` (copy the offending
    /// bytes unchanged), or `copy-octal` (render them as `\NNN`).
    pub fallback: FallbackMode,

    /// The largest chunk, in bytes, returned by a single stream read.
    pub chunk_size: usize,
}

impl Default for IconvConfig {
    fn default() -> Self {
        IconvConfig {
            fallback: FallbackMode::None,
            chunk_size: 1024,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct MailboxConfig {
    /// The URL opened by `Mailbox::default_for(None)`.
    ///
    /// `Mailbox::default_for(Some(name))` opens the mailbox of the same scheme
    /// named `name` instead.
    pub default_url: String,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        MailboxConfig {
            default_url: "memory:INBOX".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// The logical path of a dynamically loaded engine.
    ///
    /// The library itself is found through the libtool descriptor
    /// `<library>.la`. If unset, the built-in local engine is used.
    pub library: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// A `log4rs` TOML configuration file, used when standard error is not a
    /// terminal.
    pub config_file: Option<PathBuf>,
}

impl Config {
    /// Reads and parses the TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}
