pub mod metrics;
pub mod request_id;
pub mod service_key;

pub use metrics::metrics_middleware;
pub use request_id::{request_id_middleware, RequestId, REQUEST_ID_HEADER};
pub use service_key::require_service_key;
