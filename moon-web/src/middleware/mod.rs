pub mod access_control;
pub mod authenticate;
pub mod request_logger;

pub use access_control::AccessControl;
pub use authenticate::Authenticate;
pub use request_logger::RequestLogger;
