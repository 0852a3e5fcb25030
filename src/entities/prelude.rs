pub use super::categories::Entity as Categories;
pub use super::comments::Entity as Comments;
pub use super::departments::Entity as Departments;
pub use super::downvotes::Entity as Downvotes;
pub use super::materials::Entity as Materials;
pub use super::semester_years::Entity as SemesterYears;
pub use super::tokens::Entity as Tokens;
pub use super::universities::Entity as Universities;
pub use super::upvotes::Entity as Upvotes;
pub use super::user_profiles::Entity as UserProfiles;
pub use super::users::Entity as Users;
