pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod slack;

pub use routes::create_router;
