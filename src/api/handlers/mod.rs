pub mod auth;
pub mod comments;
pub mod health;
pub mod lookups;
pub mod materials;
pub mod users;
pub mod votes;
