//! Aggregates over workout rows.

use chrono::NaiveDate;
use rusqlite::params;

use liftlog_types::{ExerciseType, Fixed2, WeightUnit};

use crate::error::Result;

use super::LiftlogStore;
use super::query::{PersonalRecord, TypeSummary, WorkoutSummary, cutoff_date};
use super::workout_ops::DATE_FORMAT;

/// Personal records returned by a summary.
const PERSONAL_RECORD_LIMIT: i64 = 10;

impl LiftlogStore {
    /// Per-type aggregates over the last `since_days` days plus all-time
    /// personal records.
    pub fn summarize(&self, user_id: &str, since_days: i64) -> Result<WorkoutSummary> {
        self.summarize_as_of(user_id, since_days, None)
    }

    /// [`summarize`](Self::summarize) relative to a fixed reference date.
    pub fn summarize_as_of(
        &self,
        user_id: &str,
        since_days: i64,
        as_of: Option<NaiveDate>,
    ) -> Result<WorkoutSummary> {
        let cutoff = cutoff_date(as_of, since_days)
            .format(DATE_FORMAT)
            .to_string();
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            r#"
            SELECT
                exercise_type,
                COUNT(*),
                COUNT(DISTINCT workout_date),
                SUM(COALESCE(sets, 1)),
                SUM(reps),
                SUM(weight),
                COUNT(weight),
                MAX(weight),
                SUM(duration),
                SUM(distance)
            FROM workout_stats
            WHERE user_id = ?1 AND workout_date >= ?2
            GROUP BY exercise_type
            ORDER BY exercise_type
            "#,
        )?;
        let mut rows = stmt.query(params![user_id, cutoff])?;

        let mut summary_by_type = Vec::new();
        while let Some(row) = rows.next()? {
            let exercise_type: String = row.get(0)?;
            let weight_sum: Option<i64> = row.get(5)?;
            let weight_count: i64 = row.get(6)?;
            summary_by_type.push(TypeSummary {
                exercise_type: ExerciseType::parse_lenient(&exercise_type),
                workout_count: row.get(1)?,
                days_worked_out: row.get(2)?,
                total_sets: row.get(3)?,
                total_reps: row.get(4)?,
                avg_weight: weight_sum
                    .and_then(|sum| Fixed2::from_hundredths(sum).div_round(weight_count)),
                max_weight: row.get::<_, Option<i64>>(7)?.map(Fixed2::from_hundredths),
                total_duration: row.get(8)?,
                total_distance: row.get::<_, Option<i64>>(9)?.map(Fixed2::from_hundredths),
            });
        }
        drop(rows);
        drop(stmt);

        let mut stmt = conn.prepare(
            r#"
            SELECT exercise_name, MAX(weight) AS max_weight, weight_unit
            FROM workout_stats
            WHERE user_id = ?1 AND weight IS NOT NULL
            GROUP BY exercise_name, weight_unit
            ORDER BY max_weight DESC, exercise_name
            LIMIT ?2
            "#,
        )?;
        let mut rows = stmt.query(params![user_id, PERSONAL_RECORD_LIMIT])?;

        let mut personal_records = Vec::new();
        while let Some(row) = rows.next()? {
            let unit: Option<String> = row.get(2)?;
            personal_records.push(PersonalRecord {
                exercise_name: row.get(0)?,
                max_weight: Fixed2::from_hundredths(row.get(1)?),
                weight_unit: unit.as_deref().and_then(WeightUnit::parse),
            });
        }

        Ok(WorkoutSummary {
            summary_by_type,
            personal_records,
            period_days: since_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liftlog_types::{DistanceUnit, DurationUnit, WorkoutDraft};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn lift(name: &str, kg: i64, reps: i64, sets: Option<i64>) -> WorkoutDraft {
        let mut draft = WorkoutDraft::new(name, ExerciseType::Strength)
            .with_weight(Fixed2::from_units(kg), WeightUnit::Kg)
            .with_reps(reps);
        draft.sets = sets;
        draft
    }

    /// Two strength days, two cardio sessions, one old deadlift outside the window.
    fn fixture() -> LiftlogStore {
        let store = LiftlogStore::open_in_memory().unwrap();
        store
            .save_records(
                "s1",
                "u1",
                &[lift("bench press", 80, 5, Some(3)), lift("squat", 90, 5, None)],
                Some(date(2025, 6, 10)),
            )
            .unwrap();
        store
            .save_records(
                "s2",
                "u1",
                &[
                    lift("bench press", 85, 3, Some(2)),
                    WorkoutDraft::new("running", ExerciseType::Cardio)
                        .with_distance(Fixed2::from_hundredths(525), DistanceUnit::Km)
                        .with_duration(30, DurationUnit::Minutes),
                    WorkoutDraft::new("cycling", ExerciseType::Cardio)
                        .with_distance(Fixed2::from_units(20), DistanceUnit::Km),
                ],
                Some(date(2025, 6, 12)),
            )
            .unwrap();
        store
            .save_records(
                "s3",
                "u1",
                &[lift("deadlift", 140, 1, Some(1))],
                Some(date(2025, 1, 5)),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_summary_by_type() {
        let summary = fixture()
            .summarize_as_of("u1", 30, Some(date(2025, 6, 15)))
            .unwrap();
        assert_eq!(summary.period_days, 30);
        assert_eq!(summary.summary_by_type.len(), 2);

        let cardio = &summary.summary_by_type[0];
        assert_eq!(cardio.exercise_type, ExerciseType::Cardio);
        assert_eq!(cardio.workout_count, 2);
        assert_eq!(cardio.days_worked_out, 1);
        assert_eq!(cardio.total_sets, 2);
        assert_eq!(cardio.total_reps, None);
        assert_eq!(cardio.avg_weight, None);
        assert_eq!(cardio.max_weight, None);
        assert_eq!(cardio.total_duration, Some(30));
        assert_eq!(cardio.total_distance, Some(Fixed2::from_hundredths(2525)));

        let strength = &summary.summary_by_type[1];
        assert_eq!(strength.exercise_type, ExerciseType::Strength);
        assert_eq!(strength.workout_count, 3);
        assert_eq!(strength.days_worked_out, 2);
        // squat has no set count and contributes one
        assert_eq!(strength.total_sets, 6);
        assert_eq!(strength.total_reps, Some(13));
        assert_eq!(strength.max_weight, Some(Fixed2::from_units(90)));
        // (80 + 90 + 85) / 3 = 85.00
        assert_eq!(strength.avg_weight, Some(Fixed2::from_units(85)));
        assert_eq!(strength.total_duration, None);
    }

    #[test]
    fn test_average_is_exact_and_rounded() {
        let store = LiftlogStore::open_in_memory().unwrap();
        store
            .save_records(
                "s1",
                "u1",
                &[
                    lift("curl", 10, 10, None),
                    lift("curl", 10, 10, None),
                    WorkoutDraft::new("curl", ExerciseType::Strength)
                        .with_weight(Fixed2::from_hundredths(1001), WeightUnit::Kg),
                ],
                Some(date(2025, 6, 1)),
            )
            .unwrap();
        let summary = store
            .summarize_as_of("u1", 30, Some(date(2025, 6, 2)))
            .unwrap();
        // 30.01 / 3 = 10.0033.. -> 10.00
        assert_eq!(
            summary.summary_by_type[0].avg_weight,
            Some(Fixed2::from_units(10))
        );
    }

    #[test]
    fn test_personal_records_all_time() {
        let summary = fixture()
            .summarize_as_of("u1", 30, Some(date(2025, 6, 15)))
            .unwrap();
        let records: Vec<_> = summary
            .personal_records
            .iter()
            .map(|pr| (pr.exercise_name.as_str(), pr.max_weight, pr.weight_unit))
            .collect();
        assert_eq!(
            records,
            vec![
                ("deadlift", Fixed2::from_units(140), Some(WeightUnit::Kg)),
                ("squat", Fixed2::from_units(90), Some(WeightUnit::Kg)),
                ("bench press", Fixed2::from_units(85), Some(WeightUnit::Kg)),
            ]
        );
    }

    #[test]
    fn test_personal_records_split_by_unit_and_limited() {
        let store = LiftlogStore::open_in_memory().unwrap();
        let mut drafts: Vec<WorkoutDraft> =
            (1..=12).map(|i| lift(&format!("lift {i}"), i * 10, 1, None)).collect();
        drafts.push(
            WorkoutDraft::new("lift 12", ExerciseType::Strength)
                .with_weight(Fixed2::from_units(300), WeightUnit::Lbs),
        );
        store.save_records("s1", "u1", &drafts, None).unwrap();

        let summary = store.summarize("u1", 30).unwrap();
        assert_eq!(summary.personal_records.len(), 10);
        assert_eq!(summary.personal_records[0].weight_unit, Some(WeightUnit::Lbs));
        assert_eq!(summary.personal_records[1].exercise_name, "lift 12");
        assert_eq!(summary.personal_records[1].weight_unit, Some(WeightUnit::Kg));
    }

    #[test]
    fn test_empty_summary() {
        let store = LiftlogStore::open_in_memory().unwrap();
        let summary = store.summarize("nobody", 7).unwrap();
        assert!(summary.summary_by_type.is_empty());
        assert!(summary.personal_records.is_empty());
        assert_eq!(summary.period_days, 7);
    }
}
