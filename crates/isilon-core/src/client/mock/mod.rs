//! Mock management API for tests and local development.

mod scenarios;
mod transport;

pub use scenarios::SCENARIO_NOW;
pub use transport::MockTransport;
