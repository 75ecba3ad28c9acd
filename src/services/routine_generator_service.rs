use chrono::Utc;
use serde_json::json;
use sqlx::{PgPool, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::models::{DifficultyLevel, Exercise, GenerateRoutineRequest, MovementPattern, Routine};
use crate::services::objective_rules::{prescription_for, split_for, Prescription, SplitDay};

/// Template-based routine generator.
///
/// Applies the static objective/split tables to the exercise catalog: filter
/// by equipment and muscle group, rank by a fixed priority, take each day's
/// quota and attach the objective's prescription.
#[derive(Debug, Clone)]
pub struct RoutineGeneratorService {
    db: PgPool,
}

impl RoutineGeneratorService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Generate a routine for a trainer and persist it
    pub async fn generate(
        &self,
        trainer_id: Uuid,
        request: GenerateRoutineRequest,
    ) -> Result<Routine, ApiError> {
        if !(1..=7).contains(&request.days_per_week) {
            return Err(ApiError::BadRequest(
                "days_per_week must be between 1 and 7".into(),
            ));
        }

        let catalog = self.load_candidates(&request).await?;
        if catalog.is_empty() {
            return Err(ApiError::BadRequest(
                "no exercises match the requested equipment".into(),
            ));
        }

        let split = split_for(request.days_per_week);
        let prescription = prescription_for(request.objective);

        let days: Vec<serde_json::Value> = split
            .iter()
            .map(|day| {
                let picks = select_for_day(&catalog, day, request.level);
                build_day(day, &picks, &prescription)
            })
            .collect();

        let content = json!({ "days": days });
        let name = request.name.unwrap_or_else(|| {
            format!(
                "{:?} {}x/week",
                request.objective, request.days_per_week
            )
        });

        let routine = sqlx::query_as::<_, Routine>(
            "INSERT INTO routines (id, trainer_id, name, description, objective, days_per_week, content, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
             RETURNING id, trainer_id, name, description, objective, days_per_week, content, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(trainer_id)
        .bind(&name)
        .bind(Option::<String>::None)
        .bind(request.objective)
        .bind(request.days_per_week)
        .bind(&content)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        info!(
            "generated routine {} for trainer {} ({} days)",
            routine.id, trainer_id, request.days_per_week
        );

        Ok(routine)
    }

    /// Fetch every exercise usable under the requested equipment and level
    async fn load_candidates(
        &self,
        request: &GenerateRoutineRequest,
    ) -> Result<Vec<Exercise>, ApiError> {
        let mut qb = QueryBuilder::new(
            "SELECT id, name, muscle_group, equipment, movement_pattern, difficulty,
                    instructions, created_by, created_at, updated_at
             FROM exercises WHERE TRUE",
        );

        // An empty equipment list means no restriction
        if !request.available_equipment.is_empty() {
            qb.push(" AND equipment = ANY(")
                .push_bind(request.available_equipment.clone())
                .push(")");
        }

        // Beginners never get advanced movements; everyone else sees the
        // full catalog and the ranking handles proximity
        if request.level == DifficultyLevel::Beginner {
            qb.push(" AND difficulty <> ")
                .push_bind(DifficultyLevel::Advanced);
        }

        let exercises = qb.build_query_as::<Exercise>().fetch_all(&self.db).await?;

        Ok(exercises)
    }
}

/// Select exercises for one split day.
///
/// For each muscle-group quota, candidates are ranked by the fixed priority
/// and taken without repeating an exercise within the day. A quota that the
/// catalog cannot fill yields fewer exercises, never an error.
pub fn select_for_day<'a>(
    catalog: &'a [Exercise],
    day: &SplitDay,
    level: DifficultyLevel,
) -> Vec<&'a Exercise> {
    let mut picked: Vec<&Exercise> = Vec::new();

    for (muscle, quota) in day.quotas {
        let mut candidates: Vec<&Exercise> = catalog
            .iter()
            .filter(|e| e.muscle_group == *muscle)
            .filter(|e| !picked.iter().any(|p| p.id == e.id))
            .collect();

        candidates.sort_by(|a, b| rank_key(a, level).cmp(&rank_key(b, level)));
        picked.extend(candidates.into_iter().take(*quota));
    }

    picked
}

/// Fixed ranking priority: compound before isolation, then difficulty
/// proximity to the client's level, then stable name order.
fn rank_key(exercise: &Exercise, level: DifficultyLevel) -> (u8, i32, String) {
    let pattern_rank = match exercise.movement_pattern {
        MovementPattern::Compound => 0,
        MovementPattern::Isolation => 1,
    };
    let difficulty_distance = (exercise.difficulty.rank() - level.rank()).abs();

    (pattern_rank, difficulty_distance, exercise.name.clone())
}

fn build_day(
    day: &SplitDay,
    picks: &[&Exercise],
    prescription: &Prescription,
) -> serde_json::Value {
    let exercises: Vec<serde_json::Value> = picks
        .iter()
        .map(|e| {
            json!({
                "exercise_id": e.id,
                "name": e.name,
                "muscle_group": e.muscle_group,
                "equipment": e.equipment,
                "sets": prescription.sets,
                "rep_min": prescription.rep_min,
                "rep_max": prescription.rep_max,
                "rest_seconds": prescription.rest_seconds,
            })
        })
        .collect();

    json!({
        "name": day.name,
        "exercises": exercises,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Equipment, MuscleGroup, TrainingObjective};
    use crate::services::objective_rules;

    fn exercise(
        name: &str,
        muscle_group: MuscleGroup,
        pattern: MovementPattern,
        difficulty: DifficultyLevel,
    ) -> Exercise {
        Exercise {
            id: Uuid::new_v4(),
            name: name.to_string(),
            muscle_group,
            equipment: Equipment::Barbell,
            movement_pattern: pattern,
            difficulty,
            instructions: None,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn chest_day() -> SplitDay {
        SplitDay {
            name: "Chest",
            quotas: &[(MuscleGroup::Chest, 2)],
        }
    }

    #[test]
    fn test_compound_ranks_before_isolation() {
        let catalog = vec![
            exercise(
                "Cable Fly",
                MuscleGroup::Chest,
                MovementPattern::Isolation,
                DifficultyLevel::Beginner,
            ),
            exercise(
                "Bench Press",
                MuscleGroup::Chest,
                MovementPattern::Compound,
                DifficultyLevel::Intermediate,
            ),
        ];

        let picks = select_for_day(&catalog, &chest_day(), DifficultyLevel::Beginner);

        assert_eq!(picks.len(), 2);
        assert_eq!(picks[0].name, "Bench Press");
        assert_eq!(picks[1].name, "Cable Fly");
    }

    #[test]
    fn test_difficulty_proximity_breaks_ties() {
        let catalog = vec![
            exercise(
                "Weighted Dip",
                MuscleGroup::Chest,
                MovementPattern::Compound,
                DifficultyLevel::Advanced,
            ),
            exercise(
                "Push Up",
                MuscleGroup::Chest,
                MovementPattern::Compound,
                DifficultyLevel::Beginner,
            ),
        ];

        let picks = select_for_day(&catalog, &chest_day(), DifficultyLevel::Beginner);

        assert_eq!(picks[0].name, "Push Up");
    }

    #[test]
    fn test_name_order_is_the_final_tiebreak() {
        let catalog = vec![
            exercise(
                "Incline Press",
                MuscleGroup::Chest,
                MovementPattern::Compound,
                DifficultyLevel::Beginner,
            ),
            exercise(
                "Bench Press",
                MuscleGroup::Chest,
                MovementPattern::Compound,
                DifficultyLevel::Beginner,
            ),
        ];

        let picks = select_for_day(&catalog, &chest_day(), DifficultyLevel::Beginner);

        assert_eq!(picks[0].name, "Bench Press");
        assert_eq!(picks[1].name, "Incline Press");
    }

    #[test]
    fn test_unfillable_quota_yields_fewer_exercises() {
        let catalog = vec![exercise(
            "Bench Press",
            MuscleGroup::Chest,
            MovementPattern::Compound,
            DifficultyLevel::Beginner,
        )];

        let picks = select_for_day(&catalog, &chest_day(), DifficultyLevel::Beginner);

        assert_eq!(picks.len(), 1);
    }

    #[test]
    fn test_no_exercise_repeats_within_a_day() {
        let day = SplitDay {
            name: "Chest Twice",
            quotas: &[(MuscleGroup::Chest, 1), (MuscleGroup::Chest, 1)],
        };
        let catalog = vec![
            exercise(
                "Bench Press",
                MuscleGroup::Chest,
                MovementPattern::Compound,
                DifficultyLevel::Beginner,
            ),
            exercise(
                "Incline Press",
                MuscleGroup::Chest,
                MovementPattern::Compound,
                DifficultyLevel::Beginner,
            ),
        ];

        let picks = select_for_day(&catalog, &day, DifficultyLevel::Beginner);

        assert_eq!(picks.len(), 2);
        assert_ne!(picks[0].id, picks[1].id);
    }

    #[test]
    fn test_day_json_carries_the_prescription() {
        let catalog = vec![exercise(
            "Bench Press",
            MuscleGroup::Chest,
            MovementPattern::Compound,
            DifficultyLevel::Beginner,
        )];
        let picks = select_for_day(&catalog, &chest_day(), DifficultyLevel::Beginner);
        let prescription = objective_rules::prescription_for(TrainingObjective::Hypertrophy);

        let day = build_day(&chest_day(), &picks, &prescription);

        assert_eq!(day["name"], "Chest");
        assert_eq!(day["exercises"][0]["sets"], 4);
        assert_eq!(day["exercises"][0]["rep_min"], 8);
        assert_eq!(day["exercises"][0]["rep_max"], 12);
    }
}
