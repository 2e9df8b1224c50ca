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

//! Reference-counted ownership of native handles.
//!
//! A `Handle` pairs a `RawHandle` with the engine that issued it. Clones share
//! one reference count; when the last clone goes away, an *owning* handle
//! tells the engine to destroy the resource. A *borrowed* handle refers to a
//! resource owned by something else (a message inside a mailbox, say). It
//! never destroys the resource, and instead keeps its parent alive for as
//! long as it exists, so that the resource cannot disappear underneath it.
//!
//! The native layer does not validate handles, so every access goes through
//! `Handle::raw()`, which refuses to hand out a handle whose resource has been
//! torn down.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, trace};

use crate::native::{Engine, EngineRef, HandleKind, RawHandle};
use crate::support::error::{Error, Result};

pub struct Handle {
    shared: Arc<Shared>,
}

struct Shared {
    engine: EngineRef,
    kind: HandleKind,
    raw: RawHandle,
    owner: bool,
    released: AtomicBool,
    parent: Option<Handle>,
}

impl Handle {
    /// Takes ownership of a freshly created native resource.
    pub fn acquire(
        engine: &EngineRef,
        kind: HandleKind,
        raw: RawHandle,
    ) -> Self {
        trace!("Acquired {} {:?}", kind, raw);
        Handle::new(engine, kind, raw, true, None)
    }

    /// Wraps a resource owned by someone else.
    ///
    /// If `parent` is given, it is kept alive until this handle and all its
    /// clones are gone.
    pub fn borrow(
        engine: &EngineRef,
        kind: HandleKind,
        raw: RawHandle,
        parent: Option<&Handle>,
    ) -> Self {
        trace!("Borrowed {} {:?}", kind, raw);
        Handle::new(engine, kind, raw, false, parent.cloned())
    }

    fn new(
        engine: &EngineRef,
        kind: HandleKind,
        raw: RawHandle,
        owner: bool,
        parent: Option<Handle>,
    ) -> Self {
        Handle {
            shared: Arc::new(Shared {
                engine: Arc::clone(engine),
                kind,
                raw,
                owner,
                released: AtomicBool::new(false),
                parent,
            }),
        }
    }

    pub fn kind(&self) -> HandleKind {
        self.shared.kind
    }

    /// Whether the last release of this handle destroys the resource.
    pub fn is_owner(&self) -> bool {
        self.shared.owner
    }

    /// The number of live clones of this handle.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.shared)
    }

    pub fn engine(&self) -> &dyn Engine {
        &*self.shared.engine
    }

    pub fn engine_ref(&self) -> &EngineRef {
        &self.shared.engine
    }

    /// Whether this is a clone of `other`.
    pub fn same(&self, other: &Handle) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Returns the native handle, or `Error::Disposed` if the resource (or,
    /// for a borrowed handle, its parent) has been torn down.
    pub fn raw(&self) -> Result<RawHandle> {
        if self.shared.released.load(Ordering::Acquire) {
            return Err(Error::Disposed(self.shared.kind));
        }

        if let Some(ref parent) = self.shared.parent {
            if parent.is_disposed() {
                return Err(Error::Disposed(self.shared.kind));
            }
        }

        Ok(self.shared.raw)
    }

    pub fn is_disposed(&self) -> bool {
        self.raw().is_err()
    }

    /// Tears the resource down now, on behalf of every clone.
    ///
    /// Later use of any clone fails with `Error::Disposed`. Disposing twice is
    /// a programming error and is reported as `Error::Disposed`.
    pub fn dispose(&self) -> Result<()> {
        if self.shared.teardown() {
            Ok(())
        } else {
            error!(
                "{} {:?} disposed more than once",
                self.shared.kind, self.shared.raw
            );
            Err(Error::Disposed(self.shared.kind))
        }
    }

    /// Gives up this reference.
    ///
    /// Returns whether this was the last reference and the release destroyed
    /// the native resource.
    pub fn release(self) -> bool {
        match Arc::try_unwrap(self.shared) {
            Ok(shared) => shared.teardown() && shared.owner,
            Err(_) => false,
        }
    }
}

impl Shared {
    /// Runs teardown if it has not happened yet. Returns whether it ran.
    fn teardown(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }

        if self.owner {
            trace!("Destroying {} {:?}", self.kind, self.raw);
            self.engine.destroy(self.kind, self.raw);
        } else {
            trace!("Forgetting borrowed {} {:?}", self.kind, self.raw);
        }

        true
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl Clone for Handle {
    fn clone(&self) -> Self {
        Handle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Handle({} {:?}, {}, refs={}{})",
            self.shared.kind,
            self.shared.raw,
            if self.shared.owner { "owned" } else { "borrowed" },
            self.ref_count(),
            if self.shared.released.load(Ordering::Acquire) {
                ", disposed"
            } else {
                ""
            },
        )
    }
}
