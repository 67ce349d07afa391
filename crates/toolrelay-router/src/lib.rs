mod proxy;

pub use proxy::{RelayState, relay_router};
