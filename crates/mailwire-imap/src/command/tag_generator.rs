//! Command tags.

/// Hands out command tags: `A0000` to `A9999`, then `B0000`, and so on,
/// back to `A` after `Z`.
///
/// Each client owns one; tags only need to be unique among the commands a
/// single connection has in flight.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    letter: u8,
    seq: u16,
    issued: u64,
}

const PER_LETTER: u16 = 10_000;

impl TagGenerator {
    /// Starts at `<letter>0000`. Non-letters start at `A`.
    #[must_use]
    pub const fn starting_at(letter: char) -> Self {
        let letter = if letter.is_ascii_uppercase() {
            letter as u8
        } else {
            b'A'
        };
        Self {
            letter,
            seq: 0,
            issued: 0,
        }
    }

    /// Returns the next tag.
    pub fn next_tag(&mut self) -> String {
        let tag = format!("{}{:04}", char::from(self.letter), self.seq);
        self.seq += 1;
        if self.seq == PER_LETTER {
            self.seq = 0;
            self.letter = if self.letter == b'Z' { b'A' } else { self.letter + 1 };
        }
        self.issued += 1;
        tag
    }

    /// Number of tags handed out.
    #[must_use]
    pub const fn issued(&self) -> u64 {
        self.issued
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::starting_at('A')
    }
}
