pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod submissions;

pub use routes::create_router;
