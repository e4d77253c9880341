//! Candidate validation.
//!
//! Model output is untrusted. Each candidate object is checked field by
//! field: unknown fields are dropped, unparseable numbers become null, units
//! are normalized to their canonical spelling, and magnitude/unit pairs are
//! kept only when both halves are present.

use serde_json::{Map, Value};

use liftlog_types::{DistanceUnit, DurationUnit, ExerciseType, Fixed2, WeightUnit, WorkoutDraft};

/// Validate one candidate against the text it was extracted from.
///
/// Returns `None` when the candidate has no usable `exercise_name`.
pub fn validate_candidate(candidate: &Value, source_text: &str) -> Option<WorkoutDraft> {
    read_candidate(candidate).map(|draft| guard_unstated(draft, source_text))
}

/// Field-level validation without the unstated-unit guard.
///
/// Used for records a person typed in directly.
pub fn read_candidate(candidate: &Value) -> Option<WorkoutDraft> {
    let fields = candidate.as_object()?;

    let exercise_name = text_field(fields, "exercise_name")?;
    let exercise_type = fields
        .get("exercise_type")
        .and_then(Value::as_str)
        .map(ExerciseType::parse_lenient)
        .unwrap_or_default();

    let mut draft = WorkoutDraft::new(exercise_name, exercise_type);
    draft.weight = fields.get("weight").and_then(to_fixed);
    draft.weight_unit = unit_field(fields, "weight_unit", WeightUnit::parse);
    draft.reps = fields.get("reps").and_then(to_int);
    draft.sets = fields.get("sets").and_then(to_int);
    draft.duration = fields.get("duration").and_then(to_int);
    draft.duration_unit = unit_field(fields, "duration_unit", DurationUnit::parse);
    draft.distance = fields.get("distance").and_then(to_fixed);
    draft.distance_unit = unit_field(fields, "distance_unit", DistanceUnit::parse);
    draft.calories = fields.get("calories").and_then(to_int);
    draft.notes = text_field(fields, "notes");

    Some(draft.normalize_pairs())
}

/// Null out a distance or duration whose unit is never mentioned in the text.
///
/// Models tend to invent "30 minutes" for a run that only stated a distance.
pub fn guard_unstated(mut draft: WorkoutDraft, source_text: &str) -> WorkoutDraft {
    let tokens = unit_tokens(source_text);
    let mentioned = |aliases: &[&str]| aliases.iter().any(|a| tokens.iter().any(|t| t.as_str() == *a));

    if let Some(unit) = draft.distance_unit
        && !mentioned(unit.aliases())
    {
        tracing::debug!(unit = %unit, "Dropping distance not stated in text");
        draft.distance = None;
        draft.distance_unit = None;
    }
    if let Some(unit) = draft.duration_unit
        && !mentioned(unit.aliases())
    {
        tracing::debug!(unit = %unit, "Dropping duration not stated in text");
        draft.duration = None;
        draft.duration_unit = None;
    }
    draft
}

/// Lowercased word tokens, with digit/letter runs split apart (`5km` → `5`, `km`).
fn unit_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_is_digit = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }
        let is_digit = c.is_ascii_digit();
        if !current.is_empty() && is_digit != current_is_digit {
            tokens.push(std::mem::take(&mut current));
        }
        current_is_digit = is_digit;
        current.push(c);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn text_field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn unit_field<U>(fields: &Map<String, Value>, key: &str, parse: fn(&str) -> Option<U>) -> Option<U> {
    fields.get(key).and_then(Value::as_str).and_then(parse)
}

/// Integer from a JSON number or a numeric string. Fractions round half away from zero.
pub fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.round() as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<Fixed2>().ok().map(|d| d.round_units()))
        }
        _ => None,
    }
}

/// Two-digit decimal from a JSON number or a numeric string.
pub fn to_fixed(value: &Value) -> Option<Fixed2> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.checked_mul(100).map(Fixed2::from_hundredths),
            None => n.as_f64().and_then(Fixed2::from_f64),
        },
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bench_press_candidate() {
        let candidate = json!({
            "exercise_name": "bench press",
            "exercise_type": "strength",
            "weight": 80,
            "weight_unit": "kg",
            "reps": 5,
            "sets": 3
        });
        let draft = validate_candidate(&candidate, "I benched 80kg for 5 reps, 3 sets").unwrap();
        assert_eq!(draft.exercise_name, "bench press");
        assert_eq!(draft.exercise_type, ExerciseType::Strength);
        assert_eq!(draft.weight, Some(Fixed2::from_units(80)));
        assert_eq!(draft.weight_unit, Some(WeightUnit::Kg));
        assert_eq!(draft.reps, Some(5));
        assert_eq!(draft.sets, Some(3));
        assert!(draft.duration.is_none());
        assert!(draft.distance.is_none());
        assert!(draft.calories.is_none());
    }

    #[test]
    fn test_missing_or_blank_name_is_discarded() {
        assert!(validate_candidate(&json!({"exercise_type": "cardio"}), "").is_none());
        assert!(validate_candidate(&json!({"exercise_name": "   "}), "").is_none());
        assert!(validate_candidate(&json!("squat"), "").is_none());
    }

    #[test]
    fn test_type_defaults_to_other() {
        let draft = validate_candidate(&json!({"exercise_name": "yoga", "exercise_type": "FLEX"}), "")
            .unwrap();
        assert_eq!(draft.exercise_type, ExerciseType::Other);
        let draft = validate_candidate(&json!({"exercise_name": "rowing", "exercise_type": "Cardio"}), "")
            .unwrap();
        assert_eq!(draft.exercise_type, ExerciseType::Cardio);
    }

    #[test]
    fn test_bad_numbers_become_null() {
        let draft = validate_candidate(
            &json!({
                "exercise_name": "squat",
                "weight": "80kg",
                "weight_unit": "kg",
                "reps": "5",
                "sets": true,
                "calories": "lots",
                "unknown_field": 1
            }),
            "squat 80kg 5 reps",
        )
        .unwrap();
        // weight failed to parse, so its unit goes too
        assert!(draft.weight.is_none());
        assert!(draft.weight_unit.is_none());
        assert_eq!(draft.reps, Some(5));
        assert!(draft.sets.is_none());
        assert!(draft.calories.is_none());
    }

    #[test]
    fn test_unit_normalization() {
        let draft = validate_candidate(
            &json!({
                "exercise_name": "deadlift",
                "weight": 225.5,
                "weight_unit": "LB",
                "notes": ""
            }),
            "deadlift 225.5 lb",
        )
        .unwrap();
        assert_eq!(draft.weight, Some(Fixed2::from_hundredths(22550)));
        assert_eq!(draft.weight_unit, Some(WeightUnit::Lbs));
        assert!(draft.notes.is_none());
    }

    #[test]
    fn test_value_without_unit_is_dropped() {
        let draft = validate_candidate(
            &json!({"exercise_name": "running", "distance": 5, "duration_unit": "minutes"}),
            "ran 5km in 30 minutes",
        )
        .unwrap();
        assert!(draft.distance.is_none() && draft.distance_unit.is_none());
        assert!(draft.duration.is_none() && draft.duration_unit.is_none());
    }

    #[test]
    fn test_guard_drops_unstated_duration() {
        let candidate = json!({
            "exercise_name": "running",
            "exercise_type": "cardio",
            "distance": 5,
            "distance_unit": "km",
            "duration": 30,
            "duration_unit": "minutes"
        });
        let draft = validate_candidate(&candidate, "I ran 5km this morning").unwrap();
        assert_eq!(draft.distance, Some(Fixed2::from_units(5)));
        assert_eq!(draft.distance_unit, Some(DistanceUnit::Km));
        assert!(draft.duration.is_none());
        assert!(draft.duration_unit.is_none());

        let draft = validate_candidate(&candidate, "Ran 5 kilometers in 30 mins").unwrap();
        assert_eq!(draft.duration, Some(30));
        assert_eq!(draft.duration_unit, Some(DurationUnit::Minutes));
    }

    #[test]
    fn test_guard_drops_unstated_distance() {
        let candidate = json!({
            "exercise_name": "cycling",
            "distance": 20,
            "distance_unit": "miles",
            "duration": 1,
            "duration_unit": "hours"
        });
        let draft = validate_candidate(&candidate, "Cycled for 1hr").unwrap();
        assert!(draft.distance.is_none());
        assert_eq!(draft.duration, Some(1));
    }

    #[test]
    fn test_read_candidate_skips_guard() {
        let candidate = json!({
            "exercise_name": "rowing",
            "exercise_type": "cardio",
            "distance": "2.5",
            "distance_unit": "KM"
        });
        let draft = read_candidate(&candidate).unwrap();
        assert_eq!(draft.distance, Some(Fixed2::from_hundredths(250)));
        assert_eq!(draft.distance_unit, Some(DistanceUnit::Km));
        assert!(validate_candidate(&candidate, "rowing").unwrap().distance.is_none());
    }

    #[test]
    fn test_unit_tokens() {
        assert_eq!(unit_tokens("Ran 5km, 30min!"), vec!["ran", "5", "km", "30", "min"]);
    }

    #[test]
    fn test_to_int_accepts_strings_and_floats() {
        assert_eq!(to_int(&json!("12")), Some(12));
        assert_eq!(to_int(&json!(" 7 ")), Some(7));
        assert_eq!(to_int(&json!(2.5)), Some(3));
        assert_eq!(to_int(&json!("2.5")), Some(3));
        assert_eq!(to_int(&json!("12 reps")), None);
        assert_eq!(to_int(&json!(null)), None);
    }
}
