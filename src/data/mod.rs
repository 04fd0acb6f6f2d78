pub mod class;
pub mod enrollment;
pub mod password;
pub mod user;
