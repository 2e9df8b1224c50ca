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

//! Walks over the numbered items of an engine object.

use std::fmt;
use std::iter::FusedIterator;

use super::error::{Error, Result};

/// A walk over items `1..=n` of `source`, where `n` was the item count when
/// the walk started. Items added later are not visited.
///
/// If the count itself could not be determined, the walk yields that error
/// once and ends.
pub struct Snapshot<'a, S, T> {
    source: &'a S,
    fetch: fn(&S, usize) -> Result<T>,
    next: usize,
    bound: usize,
    pending: Option<Error>,
}

impl<'a, S, T> Snapshot<'a, S, T> {
    pub(crate) fn new(
        source: &'a S,
        count: Result<usize>,
        fetch: fn(&S, usize) -> Result<T>,
    ) -> Self {
        let (bound, pending) = match count {
            Ok(n) => (n, None),
            Err(e) => (0, Some(e)),
        };
        Snapshot {
            source,
            fetch,
            next: 1,
            bound,
            pending,
        }
    }
}

impl<'a, S, T> Iterator for Snapshot<'a, S, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        if let Some(e) = self.pending.take() {
            return Some(Err(e));
        }

        if self.next > self.bound {
            return None;
        }

        let no = self.next;
        self.next += 1;
        Some((self.fetch)(self.source, no))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = (self.bound + 1).saturating_sub(self.next)
            + usize::from(self.pending.is_some());
        (n, Some(n))
    }
}

impl<'a, S, T> ExactSizeIterator for Snapshot<'a, S, T> {}
impl<'a, S, T> FusedIterator for Snapshot<'a, S, T> {}

impl<'a, S: fmt::Debug, T> fmt::Debug for Snapshot<'a, S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("source", self.source)
            .field("next", &self.next)
            .field("bound", &self.bound)
            .field("pending", &self.pending)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::native::HandleKind;

    fn square(base: &usize, no: usize) -> Result<usize> {
        Ok(base * no * no)
    }

    #[test]
    fn visits_items_in_order() {
        let walk = Snapshot::new(&10, Ok(3), square);
        assert_eq!(3, walk.len());
        assert_eq!(
            vec![10, 40, 90],
            walk.collect::<Result<Vec<_>>>().unwrap()
        );
        assert_eq!(0, Snapshot::new(&10, Ok(0), square).count());
    }

    #[test]
    fn failed_count_yields_one_error() {
        let err = Error::Disposed(HandleKind::Mailbox);
        let mut walk = Snapshot::new(&10, Err(err), square);
        assert_eq!(1, walk.len());
        assert_matches!(Some(Err(Error::Disposed(_))), walk.next());
        assert!(walk.next().is_none());
        assert!(walk.next().is_none());
    }
}
