pub mod accounts;
pub mod catalog;
pub mod comments;
pub mod lookups;
pub mod material_service;
pub mod storage;
pub mod votes;
