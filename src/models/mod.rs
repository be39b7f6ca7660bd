pub mod booking;
pub mod driver;
pub mod ride;
