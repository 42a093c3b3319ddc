pub mod chassis;
pub mod pose;
