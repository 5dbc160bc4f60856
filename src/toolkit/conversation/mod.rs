

pub mod session;

pub use session::{CompanyProfile, ConversationSession, SessionState, Turn};
