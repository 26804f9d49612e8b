pub mod listing;
pub mod slots;
pub mod state;
