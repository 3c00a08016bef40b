use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Position — anonymous per-turn label hiding model identity
// ---------------------------------------------------------------------------

/// Anonymous position label assigned to one response within a turn.
///
/// The label alphabet is fixed and small; a roster of size K uses the first
/// K labels. Six labels cover every roster this system is configured for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Position {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Position {
    pub const ALL: [Position; 6] = [
        Position::A,
        Position::B,
        Position::C,
        Position::D,
        Position::E,
        Position::F,
    ];

    pub const MAX_LABELS: usize = Self::ALL.len();

    /// The first `count` labels, in order. Panics if `count` exceeds the
    /// alphabet; roster validation rules that out before this is reached.
    pub fn first(count: usize) -> &'static [Position] {
        &Self::ALL[..count]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::A => "A",
            Position::B => "B",
            Position::C => "C",
            Position::D => "D",
            Position::E => "E",
            Position::F => "F",
        }
    }

    pub fn parse(value: &str) -> Option<Position> {
        match value {
            "A" => Some(Position::A),
            "B" => Some(Position::B),
            "C" => Some(Position::C),
            "D" => Some(Position::D),
            "E" => Some(Position::E),
            "F" => Some(Position::F),
            _ => None,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
