//! The reluctant doubling Luby sequence.
//!
//! This sequence is [A182105](https://oeis.org/A182105).

/// Infinite iterator yielding the Luby sequence.
pub struct LubySequence {
    u: u64,
    v: u64,
}

impl Default for LubySequence {
    fn default() -> LubySequence {
        LubySequence { u: 1, v: 1 }
    }
}

impl LubySequence {
    /// Yields the next number of the Luby sequence.
    pub fn advance(&mut self) -> u64 {
        let result = self.v;

        // Method by Knuth 2012
        if (self.u & self.u.wrapping_neg()) == self.v {
            self.u += 1;
            self.v = 1;
        } else {
            self.v <<= 1;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The classical recursive definition of the sequence, with 1-based indices.
    fn luby_recurrence(i: u64) -> u64 {
        // find the smallest k with 2^k - 1 >= i
        let mut k = 1u64;
        while (1u64 << k) - 1 < i {
            k += 1;
        }
        if i == (1 << k) - 1 {
            1 << (k - 1)
        } else {
            luby_recurrence(i - (1 << (k - 1)) + 1)
        }
    }

    #[test]
    fn matches_the_recurrence() {
        let mut luby = LubySequence::default();
        for i in 1..200 {
            assert_eq!(luby.advance(), luby_recurrence(i));
        }
    }

    #[test]
    fn initial_terms() {
        let mut luby = LubySequence::default();
        let initial_terms: Vec<_> = std::iter::repeat_with(|| luby.advance()).take(15).collect();

        assert_eq!(initial_terms, vec![1, 1, 2, 1, 1, 2, 4, 1, 1, 2, 1, 1, 2, 4, 8]);
    }
}
