pub mod error;
pub mod response;
pub mod route;
pub mod ws;

pub use error::ApiError;
pub use response::ok;
pub use route::create_router;
