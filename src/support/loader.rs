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

//! Locating a dynamically loadable engine from its libtool descriptor.
//!
//! Engines are installed the way libtool installs modules: next to the
//! logical path `foo` there is a descriptor `foo.la`, whose `dlname` line
//! names the actual shared object. Uninstalled builds keep that object under
//! `.libs/`.

use std::fs;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use super::error::{Error, Result};

lazy_static! {
    static ref RX_DLNAME: Regex =
        Regex::new(r"(?m)^\s*dlname\s*=\s*'([^']*)'").unwrap();
}

fn fail(path: &Path, reason: impl Into<String>) -> Error {
    Error::Library {
        path: path.to_owned(),
        reason: reason.into(),
    }
}

/// Resolves the logical module path `logical` to a loadable library file.
pub fn resolve(logical: &Path) -> Result<PathBuf> {
    let mut descriptor = logical.as_os_str().to_owned();
    descriptor.push(".la");
    let descriptor = PathBuf::from(descriptor);

    let text = fs::read_to_string(&descriptor)
        .map_err(|e| fail(&descriptor, e.to_string()))?;
    let dlname = RX_DLNAME
        .captures(&text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| fail(&descriptor, "no dlname in descriptor"))?;

    let dir = descriptor.parent().unwrap_or_else(|| Path::new("."));
    let uninstalled = dir.join(".libs").join(dlname);
    if uninstalled.is_file() {
        debug!("Resolved {} to {}", logical.display(), uninstalled.display());
        return Ok(uninstalled);
    }

    let installed = dir.join(dlname);
    if installed.is_file() {
        debug!("Resolved {} to {}", logical.display(), installed.display());
        return Ok(installed);
    }

    Err(fail(&installed, "library named by descriptor does not exist"))
}

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;

    const DESCRIPTOR: &str = "\
# c_api.la - a libtool library file
# Generated by libtool
dlname='c_api.so'
library_names='c_api.so c_api.so'
old_library=''
";

    #[test]
    fn prefers_uninstalled_library() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("c_api.la"), DESCRIPTOR).unwrap();
        fs::create_dir(root.path().join(".libs")).unwrap();
        fs::write(root.path().join(".libs/c_api.so"), b"").unwrap();
        fs::write(root.path().join("c_api.so"), b"").unwrap();

        assert_eq!(
            root.path().join(".libs/c_api.so"),
            resolve(&root.path().join("c_api")).unwrap()
        );
    }

    #[test]
    fn falls_back_to_sibling_library() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("c_api.la"), DESCRIPTOR).unwrap();
        fs::write(root.path().join("c_api.so"), b"").unwrap();

        assert_eq!(
            root.path().join("c_api.so"),
            resolve(&root.path().join("c_api")).unwrap()
        );
    }

    #[test]
    fn missing_pieces_are_library_errors() {
        let root = TempDir::new().unwrap();
        let logical = root.path().join("c_api");
        assert_matches!(Err(Error::Library { .. }), resolve(&logical));

        fs::write(root.path().join("c_api.la"), "old_library=''\n").unwrap();
        assert_matches!(Err(Error::Library { .. }), resolve(&logical));

        fs::write(root.path().join("c_api.la"), DESCRIPTOR).unwrap();
        match resolve(&logical) {
            Err(Error::Library { path, .. }) => {
                assert_eq!(root.path().join("c_api.so"), path)
            }
            r => panic!("Unexpected result: {:?}", r),
        }
    }
}
