use serde::{Deserialize, Serialize};

use crate::models::{MuscleGroup, TrainingObjective};

/// Set/rep/rest prescription attached to every exercise the generator picks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    pub sets: u8,
    pub rep_min: u8,
    pub rep_max: u8,
    pub rest_seconds: u16,
}

/// Prescription table: objective -> sets, rep range, rest
pub fn prescription_for(objective: TrainingObjective) -> Prescription {
    match objective {
        TrainingObjective::Strength => Prescription {
            sets: 5,
            rep_min: 3,
            rep_max: 5,
            rest_seconds: 180,
        },
        TrainingObjective::Hypertrophy => Prescription {
            sets: 4,
            rep_min: 8,
            rep_max: 12,
            rest_seconds: 90,
        },
        TrainingObjective::Endurance => Prescription {
            sets: 3,
            rep_min: 15,
            rep_max: 20,
            rest_seconds: 45,
        },
        TrainingObjective::FatLoss => Prescription {
            sets: 3,
            rep_min: 12,
            rep_max: 15,
            rest_seconds: 60,
        },
        TrainingObjective::GeneralFitness => Prescription {
            sets: 3,
            rep_min: 10,
            rep_max: 12,
            rest_seconds: 90,
        },
    }
}

/// One training day of a split: a name plus per-muscle-group exercise quotas
#[derive(Debug, Clone)]
pub struct SplitDay {
    pub name: &'static str,
    pub quotas: &'static [(MuscleGroup, usize)],
}

use MuscleGroup::*;

const FULL_BODY_A: SplitDay = SplitDay {
    name: "Full Body A",
    quotas: &[(Quads, 1), (Chest, 1), (Back, 1), (Shoulders, 1), (Core, 1)],
};

const FULL_BODY_B: SplitDay = SplitDay {
    name: "Full Body B",
    quotas: &[(Hamstrings, 1), (Back, 1), (Chest, 1), (Glutes, 1), (Core, 1)],
};

const UPPER: SplitDay = SplitDay {
    name: "Upper",
    quotas: &[(Chest, 2), (Back, 2), (Shoulders, 1), (Biceps, 1), (Triceps, 1)],
};

const LOWER: SplitDay = SplitDay {
    name: "Lower",
    quotas: &[(Quads, 2), (Hamstrings, 2), (Glutes, 1), (Calves, 1), (Core, 1)],
};

const PUSH: SplitDay = SplitDay {
    name: "Push",
    quotas: &[(Chest, 2), (Shoulders, 2), (Triceps, 2)],
};

const PULL: SplitDay = SplitDay {
    name: "Pull",
    quotas: &[(Back, 3), (Biceps, 2), (Core, 1)],
};

const LEGS: SplitDay = SplitDay {
    name: "Legs",
    quotas: &[(Quads, 2), (Hamstrings, 2), (Glutes, 1), (Calves, 1)],
};

/// Split table: days per week -> named days with muscle quotas.
///
/// Out-of-range requests clamp to the nearest supported split.
pub fn split_for(days_per_week: i16) -> Vec<SplitDay> {
    match days_per_week {
        i16::MIN..=1 => vec![FULL_BODY_A],
        2 => vec![FULL_BODY_A, FULL_BODY_B],
        3 => vec![FULL_BODY_A, FULL_BODY_B, FULL_BODY_A],
        4 => vec![UPPER, LOWER, UPPER, LOWER],
        5 => vec![PUSH, PULL, LEGS, UPPER, LOWER],
        _ => vec![PUSH, PULL, LEGS, PUSH, PULL, LEGS],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_objective_has_a_prescription() {
        for objective in [
            TrainingObjective::Strength,
            TrainingObjective::Hypertrophy,
            TrainingObjective::Endurance,
            TrainingObjective::FatLoss,
            TrainingObjective::GeneralFitness,
        ] {
            let p = prescription_for(objective);
            assert!(p.sets >= 3);
            assert!(p.rep_min <= p.rep_max);
            assert!(p.rest_seconds >= 45);
        }
    }

    #[test]
    fn test_strength_rests_longer_than_endurance() {
        let strength = prescription_for(TrainingObjective::Strength);
        let endurance = prescription_for(TrainingObjective::Endurance);

        assert!(strength.rest_seconds > endurance.rest_seconds);
        assert!(strength.rep_max < endurance.rep_min);
    }

    #[test]
    fn test_split_day_counts() {
        for days in 1..=6 {
            assert_eq!(split_for(days).len(), days as usize, "split for {days} days");
        }
    }

    #[test]
    fn test_split_clamps_out_of_range() {
        assert_eq!(split_for(0).len(), 1);
        assert_eq!(split_for(-3).len(), 1);
        assert_eq!(split_for(9).len(), 6);
    }

    #[test]
    fn test_every_split_day_has_quotas() {
        for days in 1..=6 {
            for day in split_for(days) {
                assert!(!day.quotas.is_empty(), "{} has no quotas", day.name);
                let total: usize = day.quotas.iter().map(|(_, n)| n).sum();
                assert!(total >= 3, "{} prescribes too few exercises", day.name);
            }
        }
    }
}
