use chrono::{DateTime, Local};
use std::fmt;

/// Station labels at the tunnel mouths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Station {
    A,
    B,
    E,
    F,
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Station::A => "A",
            Station::B => "B",
            Station::E => "E",
            Station::F => "F",
        };
        // pad() so width specifiers in the log formats apply
        f.pad(s)
    }
}

/// The four fixed routes through the tunnel, named for their
/// origin station and tunnel portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    AC,
    BC,
    ED,
    FD,
}

impl Direction {
    /// All routes, in the scheduler's tie-break precedence order
    /// (origin A before B before E before F).
    pub const ALL: [Direction; 4] = [Direction::AC, Direction::BC, Direction::ED, Direction::FD];

    pub fn index(self) -> usize {
        match self {
            Direction::AC => 0,
            Direction::BC => 1,
            Direction::ED => 2,
            Direction::FD => 3,
        }
    }

    pub fn origin(self) -> Station {
        match self {
            Direction::AC => Station::A,
            Direction::BC => Station::B,
            Direction::ED => Station::E,
            Direction::FD => Station::F,
        }
    }

    /// The two stations reachable from this route's origin. The first
    /// entry is chosen when the destination draw falls below 0.5.
    pub fn destinations(self) -> [Station; 2] {
        match self {
            Direction::AC | Direction::BC => [Station::E, Station::F],
            Direction::ED | Direction::FD => [Station::A, Station::B],
        }
    }
}

/// A single train. Immutable once enqueued, except for the departure
/// stamp which the scheduler writes exactly once after transit.
#[derive(Debug, Clone)]
pub struct Train {
    pub id: u64,
    /// Length in distance units, either 100 or 200.
    pub length: u32,
    /// Constant speed in distance units per time unit.
    pub speed: u32,
    pub starting_point: Station,
    pub destination_point: Station,
    pub arrival_time: DateTime<Local>,
    pub departure_time: Option<DateTime<Local>>,
}

impl Train {
    /// Time units needed to clear the tunnel, before any breakdown delay.
    pub fn base_passage_time(&self, tunnel_length: u32) -> u64 {
        ((self.length + tunnel_length) / self.speed) as u64
    }
}
