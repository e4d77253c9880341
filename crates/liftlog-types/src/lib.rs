//! Shared domain types for LiftLog.
//!
//! Everything here is plain data: conversation messages, the workout record
//! model, the fixed-point decimal used for magnitudes, and the per-client
//! profile/settings that drive the coaching persona.

pub mod decimal;
pub mod message;
pub mod profile;
pub mod workout;

pub use decimal::{Fixed2, ParseFixedError};
pub use message::{ChatMessage, Role};
pub use profile::{CoachSettings, CoachingStyle, DetailLevel, UserProfile};
pub use workout::{
    DistanceUnit, DurationUnit, ExerciseType, WeightUnit, WorkoutDraft, WorkoutEntry,
};

/// User id used when a request does not name one.
pub const DEFAULT_USER_ID: &str = "default_user";
