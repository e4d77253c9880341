//! Workout row inserts and listings.

use chrono::{Local, NaiveDate};
use rusqlite::{Row, params, params_from_iter, types::Value as SqlValue};
use tracing::debug;

use liftlog_types::{
    DistanceUnit, DurationUnit, ExerciseType, Fixed2, WeightUnit, WorkoutDraft, WorkoutEntry,
};

use crate::error::{Result, StoreError};

use super::query::WorkoutQuery;
use super::{LiftlogStore, now_stamp};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

const ENTRY_COLUMNS: &str = r#"
    id, user_id, session_id, exercise_name, exercise_type,
    weight, weight_unit, reps, sets, duration, duration_unit,
    distance, distance_unit, calories, notes,
    workout_date, create_time, create_date
"#;

impl LiftlogStore {
    /// Insert one row per draft, all in a single transaction.
    ///
    /// Each row gets a fresh id and the current timestamps. `workout_date`
    /// defaults to today. Empty input touches nothing.
    pub fn save_records(
        &self,
        session_id: &str,
        user_id: &str,
        drafts: &[WorkoutDraft],
        workout_date: Option<NaiveDate>,
    ) -> Result<Vec<WorkoutEntry>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let workout_date = workout_date.unwrap_or_else(|| Local::now().date_naive());
        let (now_ms, now_dt) = now_stamp();

        let entries: Vec<WorkoutEntry> = drafts
            .iter()
            .map(|draft| WorkoutEntry {
                id: uuid::Uuid::new_v4().simple().to_string(),
                user_id: user_id.to_string(),
                session_id: session_id.to_string(),
                details: draft.clone().normalize_pairs(),
                workout_date,
                create_time: now_ms,
                create_date: now_dt.clone(),
            })
            .collect();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO workout_stats ({ENTRY_COLUMNS}) VALUES \
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
            ))?;
            for entry in &entries {
                let d = &entry.details;
                stmt.execute(params![
                    entry.id,
                    entry.user_id,
                    entry.session_id,
                    d.exercise_name,
                    d.exercise_type.as_str(),
                    d.weight.map(|w| w.hundredths()),
                    d.weight_unit.map(|u| u.as_str()),
                    d.reps,
                    d.sets,
                    d.duration,
                    d.duration_unit.map(|u| u.as_str()),
                    d.distance.map(|v| v.hundredths()),
                    d.distance_unit.map(|u| u.as_str()),
                    d.calories,
                    d.notes,
                    entry.workout_date.format(DATE_FORMAT).to_string(),
                    entry.create_time,
                    entry.create_date,
                ])?;
            }
        }
        tx.commit()?;

        debug!(
            session_id = %session_id,
            user_id = %user_id,
            count = entries.len(),
            "Saved workout records"
        );
        Ok(entries)
    }

    /// Workouts matching `query`, newest first.
    pub fn query(&self, query: &WorkoutQuery) -> Result<Vec<WorkoutEntry>> {
        let mut sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM workout_stats WHERE user_id = ?1 AND workout_date >= ?2"
        );
        let mut values = vec![
            SqlValue::Text(query.user_id.clone()),
            SqlValue::Text(query.cutoff().format(DATE_FORMAT).to_string()),
        ];
        if let Some(exercise_type) = query.exercise_type {
            sql.push_str(" AND exercise_type = ?3");
            values.push(SqlValue::Text(exercise_type.as_str().to_string()));
        }
        sql.push_str(" ORDER BY workout_date DESC, create_time DESC");

        self.select_entries(&sql, values)
    }

    /// Every workout of one exercise for a user, newest first.
    pub fn history(&self, user_id: &str, exercise_name: &str) -> Result<Vec<WorkoutEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM workout_stats \
             WHERE user_id = ?1 AND exercise_name = ?2 \
             ORDER BY workout_date DESC, create_time DESC"
        );
        self.select_entries(
            &sql,
            vec![
                SqlValue::Text(user_id.to_string()),
                SqlValue::Text(exercise_name.to_string()),
            ],
        )
    }

    /// Every workout of a user regardless of date, newest first.
    pub fn all_workouts(&self, user_id: &str) -> Result<Vec<WorkoutEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM workout_stats \
             WHERE user_id = ?1 \
             ORDER BY workout_date DESC, create_time DESC"
        );
        self.select_entries(&sql, vec![SqlValue::Text(user_id.to_string())])
    }

    fn select_entries(&self, sql: &str, values: Vec<SqlValue>) -> Result<Vec<WorkoutEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(values))?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(row_to_entry(row)?);
        }
        Ok(entries)
    }
}

fn row_to_entry(row: &Row<'_>) -> Result<WorkoutEntry> {
    let exercise_type: String = row.get(4)?;
    let workout_date: String = row.get(15)?;
    let workout_date = NaiveDate::parse_from_str(&workout_date, DATE_FORMAT)
        .map_err(|e| StoreError::InvalidData(format!("workout_date {workout_date:?}: {e}")))?;

    let details = WorkoutDraft {
        exercise_name: row.get(3)?,
        exercise_type: ExerciseType::parse_lenient(&exercise_type),
        weight: row.get::<_, Option<i64>>(5)?.map(Fixed2::from_hundredths),
        weight_unit: unit(row, 6, WeightUnit::parse)?,
        reps: row.get(7)?,
        sets: row.get(8)?,
        duration: row.get(9)?,
        duration_unit: unit(row, 10, DurationUnit::parse)?,
        distance: row.get::<_, Option<i64>>(11)?.map(Fixed2::from_hundredths),
        distance_unit: unit(row, 12, DistanceUnit::parse)?,
        calories: row.get(13)?,
        notes: row.get(14)?,
    };

    Ok(WorkoutEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        session_id: row.get(2)?,
        details,
        workout_date,
        create_time: row.get(16)?,
        create_date: row.get(17)?,
    })
}

fn unit<U>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<U>) -> Result<Option<U>> {
    Ok(row
        .get::<_, Option<String>>(idx)?
        .as_deref()
        .and_then(parse))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn store() -> LiftlogStore {
        LiftlogStore::open_in_memory().unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bench() -> WorkoutDraft {
        WorkoutDraft::new("bench press", ExerciseType::Strength)
            .with_weight(Fixed2::from_hundredths(8050), WeightUnit::Kg)
            .with_reps(5)
            .with_sets(3)
    }

    fn row_count(store: &LiftlogStore) -> i64 {
        store
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM workout_stats", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_save_empty_is_noop() {
        let store = store();
        let saved = store.save_records("s1", "default_user", &[], None).unwrap();
        assert!(saved.is_empty());
        assert_eq!(row_count(&store), 0);
    }

    #[test]
    fn test_save_n_records_with_distinct_ids() {
        let store = store();
        let drafts = vec![
            bench(),
            WorkoutDraft::new("running", ExerciseType::Cardio)
                .with_distance(Fixed2::from_units(5), DistanceUnit::Km),
            WorkoutDraft::new("plank", ExerciseType::Other).with_notes("felt strong"),
        ];
        let saved = store.save_records("s1", "default_user", &drafts, None).unwrap();

        assert_eq!(saved.len(), 3);
        assert_eq!(row_count(&store), 3);
        let ids: HashSet<_> = saved.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(saved.iter().all(|e| e.workout_date == Local::now().date_naive()));
        assert!(saved.iter().all(|e| e.create_time == saved[0].create_time));
    }

    #[test]
    fn test_saved_rows_read_back_exactly() {
        let store = store();
        let saved = store
            .save_records("s1", "u1", &[bench()], Some(date(2025, 1, 10)))
            .unwrap();

        let history = store.history("u1", "bench press").unwrap();
        assert_eq!(history, saved);
        assert_eq!(history[0].details.weight.unwrap().to_string(), "80.50");
        assert!(store.history("u2", "bench press").unwrap().is_empty());
    }

    #[test]
    fn test_save_normalizes_half_pairs() {
        let store = store();
        let mut draft = WorkoutDraft::new("row", ExerciseType::Cardio);
        draft.distance = Some(Fixed2::from_units(2));
        let saved = store.save_records("s1", "u1", &[draft], None).unwrap();
        assert!(saved[0].details.pairs_consistent());
        assert!(saved[0].details.distance.is_none());
    }

    #[test]
    fn test_query_window_type_and_order() {
        let store = store();
        let today = date(2025, 6, 30);
        store
            .save_records("s1", "u1", &[bench()], Some(date(2025, 6, 1)))
            .unwrap();
        store
            .save_records(
                "s1",
                "u1",
                &[WorkoutDraft::new("running", ExerciseType::Cardio)],
                Some(date(2025, 6, 29)),
            )
            .unwrap();
        store
            .save_records("s1", "u1", &[bench()], Some(date(2025, 4, 1)))
            .unwrap();
        store
            .save_records("s1", "u2", &[bench()], Some(date(2025, 6, 29)))
            .unwrap();

        let recent = store.query(&WorkoutQuery::new("u1").with_as_of(today)).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].details.exercise_name, "running");
        assert_eq!(recent[1].workout_date, date(2025, 6, 1));

        let strength = store
            .query(
                &WorkoutQuery::new("u1")
                    .with_as_of(today)
                    .with_type(ExerciseType::Strength),
            )
            .unwrap();
        assert_eq!(strength.len(), 1);

        let everything = store
            .query(&WorkoutQuery::new("u1").with_as_of(today).with_since_days(365))
            .unwrap();
        assert_eq!(everything.len(), 3);
        assert_eq!(store.all_workouts("u1").unwrap().len(), 3);
    }

    #[test]
    fn test_same_day_orders_by_create_time() {
        let store = store();
        let day = Some(date(2025, 6, 1));
        store
            .save_records("s1", "u1", &[WorkoutDraft::new("first", ExerciseType::Other)], day)
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store
            .save_records("s1", "u1", &[WorkoutDraft::new("second", ExerciseType::Other)], day)
            .unwrap();

        let all = store.all_workouts("u1").unwrap();
        assert_eq!(all[0].details.exercise_name, "second");
        assert_eq!(all[1].details.exercise_name, "first");
    }
}
