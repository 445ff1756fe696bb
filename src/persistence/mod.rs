//! Trait interfaces for the external collaborators this core treats as
//! out of scope (HTTP auth facade, user/account persistence,
//! game-record archival). Each gets an in-memory reference implementation
//! so the three binaries run standalone; a real deployment swaps these for
//! adapters backed by whatever the auth/account/archival services actually
//! are, without touching gateway/matchmaker/game-node code.

pub mod auth;
pub mod game_record;
pub mod user_repo;

pub use auth::{AuthVerifier, InMemoryAuthVerifier};
pub use game_record::{GameRecordStore, InMemoryGameRecordStore, RoundRecord};
pub use user_repo::{InMemoryUserRepository, UserRanking, UserRecord, UserRepository};
