pub mod forwarder;

pub use forwarder::{ForwardError, ForwardResult, OutboundRequest, RawResponse, RequestForwarder};
