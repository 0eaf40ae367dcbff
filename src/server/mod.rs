mod handlers;
mod models;

pub use handlers::{build_router, run_server};
