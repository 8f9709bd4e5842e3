pub mod compare;
pub mod refresh;
pub mod setup;
pub mod summary;
pub mod trends;
pub mod ui;
