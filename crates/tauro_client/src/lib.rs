//! Tauro Q&A client library (config, answer service client, request-and-reveal session).
//! Used by the `tauro` terminal front end.

pub mod client;
pub mod config;
pub mod messages;
pub mod session;

pub use client::{AnswerClient, ClientError, HttpClient, DEFAULT_BASE_URL};
pub use config::{default_config_path, Config, ConfigError, RevealSection, ServerSection};
pub use session::{
    Session, SessionEvent, SessionEvents, SessionState, SubmitOutcome, REQUEST_FAILURE_MESSAGE,
    VALIDATION_MESSAGE,
};
