pub mod config;
mod config_env;
pub mod credentials;
pub mod llm;
pub mod models;
pub mod reference;
pub mod session;

pub use session::{
    ClientStatus, CompletedTurn, PendingTurn, Session, SessionServices, SessionState,
    SubmitOutcome, TurnResolution, TurnStart,
};
