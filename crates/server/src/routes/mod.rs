pub mod health;
pub mod review_ws;
pub mod saved;
