//! Per-entry logical clock.
//!
//! Every cart entry carries a [`Stamp`]: the entry's version counter plus the
//! user who produced that version. Stamps are totally ordered by
//! `(version, writer)`, so any two clients comparing the same pair of stamps
//! reach the same verdict without coordination.

use serde::{Deserialize, Serialize};

use groupcart_core::UserId;

/// Version stamp of one entry.
///
/// Field order matters: the derived `Ord` compares `version` first and falls
/// back to `writer` (lexicographic) only for equal versions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Stamp {
    version: u64,
    writer: UserId,
}

impl Stamp {
    /// Stamp of a freshly created entry.
    pub fn initial(writer: UserId) -> Self {
        Self { version: 1, writer }
    }

    pub fn new(version: u64, writer: UserId) -> Self {
        Self { version, writer }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn writer(&self) -> &UserId {
        &self.writer
    }

    /// Stamp for the next local write by `writer`.
    ///
    /// Returns `None` when the counter cannot be advanced.
    pub fn next(&self, writer: UserId) -> Option<Self> {
        let version = self.version.checked_add(1)?;
        Some(Self { version, writer })
    }
}

/// How an incoming stamp relates to the locally stored one.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Precedence {
    /// Higher version: the incoming write happened after ours.
    Supersedes,
    /// Same version, larger writer id: concurrent write, incoming wins.
    WinsTie,
    /// Identical stamp: a redelivery (or our own echo).
    Duplicate,
    /// Same version, smaller writer id: concurrent write, local wins.
    LosesTie,
    /// Lower version: the incoming write is outdated.
    Stale,
}

impl Precedence {
    pub fn of(incoming: &Stamp, local: &Stamp) -> Self {
        use core::cmp::Ordering;

        match incoming.version.cmp(&local.version) {
            Ordering::Greater => Precedence::Supersedes,
            Ordering::Less => Precedence::Stale,
            Ordering::Equal => match incoming.writer.cmp(&local.writer) {
                Ordering::Greater => Precedence::WinsTie,
                Ordering::Less => Precedence::LosesTie,
                Ordering::Equal => Precedence::Duplicate,
            },
        }
    }

    /// Whether the incoming value replaces the local one.
    pub fn replaces_local(self) -> bool {
        matches!(self, Precedence::Supersedes | Precedence::WinsTie)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    #[test]
    fn higher_version_supersedes_regardless_of_writer() {
        let local = Stamp::new(2, user("zed"));
        let incoming = Stamp::new(3, user("amy"));
        assert_eq!(Precedence::of(&incoming, &local), Precedence::Supersedes);
        assert_eq!(Precedence::of(&local, &incoming), Precedence::Stale);
    }

    #[test]
    fn equal_versions_break_ties_by_writer() {
        let a = Stamp::new(2, user("A"));
        let b = Stamp::new(2, user("B"));
        assert_eq!(Precedence::of(&b, &a), Precedence::WinsTie);
        assert_eq!(Precedence::of(&a, &b), Precedence::LosesTie);
        assert_eq!(Precedence::of(&a, &a.clone()), Precedence::Duplicate);
    }

    #[test]
    fn precedence_agrees_with_stamp_order() {
        let stamps = [
            Stamp::new(1, user("A")),
            Stamp::new(1, user("B")),
            Stamp::new(2, user("A")),
        ];
        for x in &stamps {
            for y in &stamps {
                assert_eq!(Precedence::of(x, y).replaces_local(), x > y);
            }
        }
    }

    #[test]
    fn next_increments_and_reassigns_writer() {
        let s = Stamp::initial(user("A"));
        let n = s.next(user("B")).unwrap();
        assert_eq!(n.version(), 2);
        assert_eq!(n.writer(), &user("B"));
        assert!(Stamp::new(u64::MAX, user("A")).next(user("A")).is_none());
    }
}
