pub mod recognize;
pub mod routes;
pub mod state;
