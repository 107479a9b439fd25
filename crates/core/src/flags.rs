//! Change-flag table
//!
//! Maps the native `FILE_ACTION_*` codes reported in notification records
//! to semantic change flags. The table is a compile-time constant and is
//! never mutated.

use serde::{Deserialize, Serialize, Serializer};
use smallvec::SmallVec;
use std::fmt;

/// Semantic change flag
///
/// Ordering follows the library-wide flag numbering, so sets print and
/// compare consistently across backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChangeFlag {
    /// Entry was created
    Created,
    /// Entry contents or timestamps changed
    Updated,
    /// Entry was removed
    Removed,
    /// Entry took part in a rename
    Renamed,
    /// Old name of a renamed entry
    MovedFrom,
    /// New name of a renamed entry
    MovedTo,
}

impl ChangeFlag {
    /// Name used in text output
    pub fn name(self) -> &'static str {
        match self {
            ChangeFlag::Created => "Created",
            ChangeFlag::Updated => "Updated",
            ChangeFlag::Removed => "Removed",
            ChangeFlag::Renamed => "Renamed",
            ChangeFlag::MovedFrom => "MovedFrom",
            ChangeFlag::MovedTo => "MovedTo",
        }
    }
}

impl fmt::Display for ChangeFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Native action codes (`FILE_ACTION_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ChangeAction {
    Added = 1,
    Removed = 2,
    Modified = 3,
    RenamedOldName = 4,
    RenamedNewName = 5,
}

impl ChangeAction {
    /// Raw action code as it appears in a record
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Recognize a raw action code
    pub fn from_code(code: u32) -> Option<Self> {
        FLAG_TABLE
            .iter()
            .map(|(action, _)| *action)
            .find(|action| action.code() == code)
    }
}

/// Action code to flag mapping
pub static FLAG_TABLE: &[(ChangeAction, &[ChangeFlag])] = &[
    (ChangeAction::Added, &[ChangeFlag::Created]),
    (ChangeAction::Removed, &[ChangeFlag::Removed]),
    (ChangeAction::Modified, &[ChangeFlag::Updated]),
    (ChangeAction::RenamedOldName, &[ChangeFlag::MovedFrom, ChangeFlag::Renamed]),
    (ChangeAction::RenamedNewName, &[ChangeFlag::MovedTo, ChangeFlag::Renamed]),
];

/// Map a raw action code to its flag set
///
/// Unrecognized codes yield an empty set.
pub fn decode_flags(code: u32) -> FlagSet {
    FLAG_TABLE
        .iter()
        .filter(|(action, _)| action.code() == code)
        .flat_map(|(_, flags)| flags.iter().copied())
        .collect()
}

/// Sorted, de-duplicated set of change flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FlagSet(SmallVec<[ChangeFlag; 2]>);

impl FlagSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self(SmallVec::new())
    }

    /// Build a set from a slice (order and duplicates do not matter)
    pub fn from_flags(flags: &[ChangeFlag]) -> Self {
        flags.iter().copied().collect()
    }

    /// Insert a flag, keeping the set sorted
    pub fn insert(&mut self, flag: ChangeFlag) {
        if let Err(pos) = self.0.binary_search(&flag) {
            self.0.insert(pos, flag);
        }
    }

    pub fn contains(&self, flag: ChangeFlag) -> bool {
        self.0.binary_search(&flag).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = ChangeFlag> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[ChangeFlag] {
        &self.0
    }
}

impl FromIterator<ChangeFlag> for FlagSet {
    fn from_iter<I: IntoIterator<Item = ChangeFlag>>(iter: I) -> Self {
        let mut set = FlagSet::new();
        for flag in iter {
            set.insert(flag);
        }
        set
    }
}

impl Serialize for FlagSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl fmt::Display for FlagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, flag) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(flag.name())?;
        }
        Ok(())
    }
}
