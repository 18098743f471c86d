//! Dice rolls for skill checks.
//!
//! The interpreter appends the narration text to the transcript as a
//! system-authored utterance, so a roll is durable and visible to the Game
//! Master on every later turn.

use rand::Rng;

/// Sides of the skill-check die.
pub const D20_SIDES: u32 = 20;

/// Outcome of a d20 skill-check roll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiceRoll {
    /// Uniformly distributed in `1..=20`.
    pub value: u32,

    /// Narration line for the transcript.
    pub text: String,
}

/// Roll a d20 with the thread-local RNG.
pub fn roll_d20() -> DiceRoll {
    roll_d20_with_rng(&mut rand::thread_rng())
}

/// Roll with a specific RNG (useful for testing).
pub fn roll_d20_with_rng<R: Rng>(rng: &mut R) -> DiceRoll {
    let value = rng.gen_range(1..=D20_SIDES);
    DiceRoll {
        value,
        text: format!("The player rolled a D20 for a skill check and got a {value}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn test_roll_range() {
        for _ in 0..100 {
            let roll = roll_d20();
            assert!(roll.value >= 1 && roll.value <= 20);
        }
    }

    #[test]
    fn test_narration_carries_value() {
        for _ in 0..20 {
            let roll = roll_d20();
            assert!(roll.text.contains(&roll.value.to_string()));
        }
    }

    #[test]
    fn test_deterministic_with_fixed_rng() {
        let mut rng = StepRng::new(0, 0);
        let first = roll_d20_with_rng(&mut rng);
        let mut rng = StepRng::new(0, 0);
        let second = roll_d20_with_rng(&mut rng);
        assert_eq!(first, second);
    }
}
