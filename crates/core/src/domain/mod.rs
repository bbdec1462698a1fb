pub mod intent;
pub mod knowledge;
pub mod message;
pub mod reminder;
