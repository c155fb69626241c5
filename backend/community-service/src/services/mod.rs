/// Services with side effects beyond the database
pub mod email;

pub use email::EmailService;
