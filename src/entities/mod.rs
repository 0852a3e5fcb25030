pub mod prelude;

pub mod categories;
pub mod comments;
pub mod departments;
pub mod downvotes;
pub mod materials;
pub mod semester_years;
pub mod tokens;
pub mod universities;
pub mod upvotes;
pub mod user_profiles;
pub mod users;
