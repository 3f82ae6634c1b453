//! Pin numbering for the Raspberry Pi 40-pin header.
//!
//! Configuration files address outputs by physical header position
//! ("board" numbering) by default.  The kernel GPIO interface only knows
//! Broadcom (BCM) line numbers, so every claim goes through [`PinNumbering::resolve`].
//!
//! Header positions that carry power or ground resolve to `None`.  Positions
//! 27 and 28 carry the HAT ID EEPROM bus but are ordinary GPIO lines (BCM 0
//! and 1) and resolve like any other.

use serde::{Deserialize, Serialize};

/// Highest BCM line exposed on the 40-pin header.
pub const MAX_BCM_LINE: u8 = 27;

// ---------------------------------------------------------------------------
// Board (physical header) → BCM line table
// ---------------------------------------------------------------------------

/// `(header position, BCM line)` for every GPIO-capable header position.
pub const BOARD_TO_BCM: [(u8, u8); 28] = [
    (3, 2),
    (5, 3),
    (7, 4),
    (8, 14),
    (10, 15),
    (11, 17),
    (12, 18),
    (13, 27),
    (15, 22),
    (16, 23),
    (18, 24),
    (19, 10),
    (21, 9),
    (22, 25),
    (23, 11),
    (24, 8),
    (26, 7),
    (27, 0),
    (28, 1),
    (29, 5),
    (31, 6),
    (32, 12),
    (33, 13),
    (35, 19),
    (36, 16),
    (37, 26),
    (38, 20),
    (40, 21),
];

/// Translate a physical header position into its BCM line.
pub fn board_to_bcm(board_pin: u8) -> Option<u8> {
    BOARD_TO_BCM
        .iter()
        .find(|(board, _)| *board == board_pin)
        .map(|(_, bcm)| *bcm)
}

// ---------------------------------------------------------------------------
// Numbering scheme
// ---------------------------------------------------------------------------

/// How pin numbers in the configuration are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinNumbering {
    /// Physical header position (1–40).
    #[default]
    Board,
    /// Broadcom GPIO line number (0–27).
    Bcm,
}

impl PinNumbering {
    /// Resolve a configured pin number to the kernel GPIO line.
    pub fn resolve(self, pin: u8) -> Option<u8> {
        match self {
            Self::Board => board_to_bcm(pin),
            Self::Bcm => (pin <= MAX_BCM_LINE).then_some(pin),
        }
    }
}
