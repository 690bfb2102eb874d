pub mod claims;
pub mod jwt;

pub use claims::WorkerClaims;
pub use jwt::{issue_worker_token, validate_worker_token};
