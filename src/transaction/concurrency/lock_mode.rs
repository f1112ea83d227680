// Lock modes and the multi-granularity compatibility lattice.
//
// Every decision about strength or conflict goes through the two tables
// below. The enum declaration order carries no meaning.

use std::fmt;

/// Mode a transaction requests on a single resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    IntentionShared,
    IntentionExclusive,
    Shared,
    SharedIntentionExclusive,
    Exclusive,
}

/// Aggregate mode of a request queue: the join of every granted request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupLockMode {
    NonLock,
    IS,
    IX,
    S,
    SIX,
    X,
}

impl LockMode {
    pub const ALL: [LockMode; 5] = [
        LockMode::IntentionShared,
        LockMode::IntentionExclusive,
        LockMode::Shared,
        LockMode::SharedIntentionExclusive,
        LockMode::Exclusive,
    ];

    fn index(self) -> usize {
        match self {
            LockMode::IntentionShared => 0,
            LockMode::IntentionExclusive => 1,
            LockMode::Shared => 2,
            LockMode::SharedIntentionExclusive => 3,
            LockMode::Exclusive => 4,
        }
    }

    fn from_index(index: usize) -> LockMode {
        LockMode::ALL[index]
    }

    /// Whether a request of `other` held by another transaction can coexist
    /// with a request of `self`
    pub fn is_compatible_with(self, other: LockMode) -> bool {
        COMPATIBILITY[self.index()][other.index()]
    }

    /// True when holding `self` already grants everything `requested` would
    pub fn covers(self, requested: LockMode) -> bool {
        self.join(requested) == self
    }

    /// Least upper bound of two modes in the lattice.
    ///
    /// S joined with IX is SIX; IS is below everything except itself.
    pub fn join(self, other: LockMode) -> LockMode {
        LockMode::from_index(JOIN[self.index()][other.index()])
    }

    /// The table-level intention mode implied by a record-level request
    pub fn intention(self) -> LockMode {
        match self {
            LockMode::IntentionShared | LockMode::Shared => LockMode::IntentionShared,
            _ => LockMode::IntentionExclusive,
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", GroupLockMode::from(*self))
    }
}

impl From<LockMode> for GroupLockMode {
    fn from(mode: LockMode) -> Self {
        match mode {
            LockMode::IntentionShared => GroupLockMode::IS,
            LockMode::IntentionExclusive => GroupLockMode::IX,
            LockMode::Shared => GroupLockMode::S,
            LockMode::SharedIntentionExclusive => GroupLockMode::SIX,
            LockMode::Exclusive => GroupLockMode::X,
        }
    }
}

impl GroupLockMode {
    pub fn as_lock_mode(self) -> Option<LockMode> {
        match self {
            GroupLockMode::NonLock => None,
            GroupLockMode::IS => Some(LockMode::IntentionShared),
            GroupLockMode::IX => Some(LockMode::IntentionExclusive),
            GroupLockMode::S => Some(LockMode::Shared),
            GroupLockMode::SIX => Some(LockMode::SharedIntentionExclusive),
            GroupLockMode::X => Some(LockMode::Exclusive),
        }
    }

    /// Group mode after adding a request of `mode`
    pub fn join(self, mode: LockMode) -> GroupLockMode {
        match self.as_lock_mode() {
            None => mode.into(),
            Some(current) => current.join(mode).into(),
        }
    }

    /// Whether a new request of `requested` can be granted alongside a
    /// queue in this group mode
    pub fn admits(self, requested: LockMode) -> bool {
        match self.as_lock_mode() {
            None => true,
            Some(current) => current.is_compatible_with(requested),
        }
    }
}

impl fmt::Display for GroupLockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GroupLockMode::NonLock => "NON_LOCK",
            GroupLockMode::IS => "IS",
            GroupLockMode::IX => "IX",
            GroupLockMode::S => "S",
            GroupLockMode::SIX => "SIX",
            GroupLockMode::X => "X",
        };
        f.write_str(name)
    }
}

// Row: mode already granted, column: mode requested. Order IS, IX, S, SIX, X.
const COMPATIBILITY: [[bool; 5]; 5] = [
    [true, true, true, true, false],
    [true, true, false, false, false],
    [true, false, true, false, false],
    [true, false, false, false, false],
    [false, false, false, false, false],
];

// Indices into LockMode::ALL.
const JOIN: [[usize; 5]; 5] = [
    [0, 1, 2, 3, 4],
    [1, 1, 3, 3, 4],
    [2, 3, 2, 3, 4],
    [3, 3, 3, 3, 4],
    [4, 4, 4, 4, 4],
];
