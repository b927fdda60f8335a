pub mod executor;
pub mod request;
pub mod results;
pub mod throttle;
pub mod wildcard;
