//! Workout record model.
//!
//! A [`WorkoutDraft`] is a validated candidate: what the extraction engine or
//! the manual-entry path produces. A [`WorkoutEntry`] is a draft after it has
//! been persisted with identity, ownership and timestamps.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Fixed2;

// ─────────────────────────────────────────────────────────────────────────────
// Enumerations
// ─────────────────────────────────────────────────────────────────────────────

/// Broad category of an exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseType {
    Strength,
    Cardio,
    #[default]
    Other,
}

impl ExerciseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExerciseType::Strength => "strength",
            ExerciseType::Cardio => "cardio",
            ExerciseType::Other => "other",
        }
    }

    /// Parse a type name; anything other than strength/cardio is `Other`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "strength" => ExerciseType::Strength,
            "cardio" => ExerciseType::Cardio,
            _ => ExerciseType::Other,
        }
    }
}

impl std::fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! unit_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $wire:literal [$($alias:literal),*]),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// Canonical wire name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }

            /// Spellings accepted for this unit, canonical name first.
            pub fn aliases(&self) -> &'static [&'static str] {
                match self {
                    $($name::$variant => &[$wire, $($alias),*],)+
                }
            }

            /// Parse any accepted spelling, case-insensitively.
            pub fn parse(s: &str) -> Option<Self> {
                let needle = s.trim().to_ascii_lowercase();
                [$($name::$variant),+]
                    .into_iter()
                    .find(|unit| unit.aliases().iter().any(|a| *a == needle))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

unit_enum! {
    /// Unit of a lifted weight.
    WeightUnit {
        Kg => "kg" ["kgs", "kilo", "kilos", "kilogram", "kilograms"],
        Lbs => "lbs" ["lb", "pound", "pounds"],
    }
}

unit_enum! {
    /// Unit of an activity duration.
    DurationUnit {
        Minutes => "minutes" ["minute", "min", "mins"],
        Hours => "hours" ["hour", "hr", "hrs", "h"],
    }
}

unit_enum! {
    /// Unit of a covered distance.
    DistanceUnit {
        Km => "km" ["kms", "kilometer", "kilometers", "kilometre", "kilometres", "k"],
        Miles => "miles" ["mile", "mi"],
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Draft
// ─────────────────────────────────────────────────────────────────────────────

/// A validated workout candidate that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutDraft {
    pub exercise_name: String,
    pub exercise_type: ExerciseType,
    pub weight: Option<Fixed2>,
    pub weight_unit: Option<WeightUnit>,
    pub reps: Option<i64>,
    pub sets: Option<i64>,
    pub duration: Option<i64>,
    pub duration_unit: Option<DurationUnit>,
    pub distance: Option<Fixed2>,
    pub distance_unit: Option<DistanceUnit>,
    pub calories: Option<i64>,
    pub notes: Option<String>,
}

impl WorkoutDraft {
    /// Create a draft with only the required fields set.
    pub fn new(exercise_name: impl Into<String>, exercise_type: ExerciseType) -> Self {
        Self {
            exercise_name: exercise_name.into(),
            exercise_type,
            weight: None,
            weight_unit: None,
            reps: None,
            sets: None,
            duration: None,
            duration_unit: None,
            distance: None,
            distance_unit: None,
            calories: None,
            notes: None,
        }
    }

    pub fn with_weight(mut self, weight: Fixed2, unit: WeightUnit) -> Self {
        self.weight = Some(weight);
        self.weight_unit = Some(unit);
        self
    }

    pub fn with_reps(mut self, reps: i64) -> Self {
        self.reps = Some(reps);
        self
    }

    pub fn with_sets(mut self, sets: i64) -> Self {
        self.sets = Some(sets);
        self
    }

    pub fn with_duration(mut self, duration: i64, unit: DurationUnit) -> Self {
        self.duration = Some(duration);
        self.duration_unit = Some(unit);
        self
    }

    pub fn with_distance(mut self, distance: Fixed2, unit: DistanceUnit) -> Self {
        self.distance = Some(distance);
        self.distance_unit = Some(unit);
        self
    }

    pub fn with_calories(mut self, calories: i64) -> Self {
        self.calories = Some(calories);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Enforce the magnitude/unit pairing: both present or both null.
    pub fn normalize_pairs(mut self) -> Self {
        if self.weight.is_none() || self.weight_unit.is_none() {
            self.weight = None;
            self.weight_unit = None;
        }
        if self.duration.is_none() || self.duration_unit.is_none() {
            self.duration = None;
            self.duration_unit = None;
        }
        if self.distance.is_none() || self.distance_unit.is_none() {
            self.distance = None;
            self.distance_unit = None;
        }
        self
    }

    /// True when every magnitude/unit pair is either complete or empty.
    pub fn pairs_consistent(&self) -> bool {
        self.weight.is_some() == self.weight_unit.is_some()
            && self.duration.is_some() == self.duration_unit.is_some()
            && self.distance.is_some() == self.distance_unit.is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry
// ─────────────────────────────────────────────────────────────────────────────

/// A persisted workout record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkoutEntry {
    /// Generated at write time, never changes.
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    #[serde(flatten)]
    pub details: WorkoutDraft,
    /// Effective date of the workout.
    pub workout_date: NaiveDate,
    /// Creation instant, epoch milliseconds.
    pub create_time: i64,
    /// Creation wall-clock time, `YYYY-MM-DD HH:MM:SS`.
    pub create_date: String,
}
