pub mod timeout_sweeper;
pub mod tontine;
