pub mod attendance;
pub mod auth;
pub mod error;
pub mod feedback;
pub mod insights;
pub mod intents;
pub mod middleware;
pub mod rewards;
pub mod settings;

mod clock;
