//! API routes.

pub mod ask;
pub mod health;
pub mod profile;
pub mod sessions;
pub mod workouts;

pub use ask::{AskQuery, ask_handler};
pub use health::{HealthResponse, StoreHealth, health_routes};
pub use profile::{
    SavedResponse, UserDataResponse, get_settings_handler, save_profile_handler,
    save_settings_handler, user_data_handler,
};
pub use sessions::{
    CurrentSessionResponse, SessionMessagesResponse, SessionSummary, activate_session_handler,
    create_session_handler, current_session_handler, delete_session_handler,
    list_sessions_handler, rename_session_handler, session_messages_handler,
};
pub use workouts::{
    AddWorkoutResponse, ExerciseHistoryResponse, ListWorkoutsResponse, MANUAL_SESSION_ID,
    add_workout_handler, exercise_history_handler, export_handler, list_workouts_handler,
    summary_handler,
};
