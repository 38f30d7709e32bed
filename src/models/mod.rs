pub mod export;
pub mod trip;
pub mod user;
