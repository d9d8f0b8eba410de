//! Process-local stores, used when no database URL is configured and by the test suite.

pub mod reset_token_repo;
pub mod session_repo;
pub mod user_repo;

pub use reset_token_repo::MemoryResetTokenStore;
pub use session_repo::MemorySessionStore;
pub use user_repo::MemoryUserStore;
