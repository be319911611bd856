pub mod dosage;
pub mod reminder;
pub mod user;
