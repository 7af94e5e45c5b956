// uwbctl-backend: the ranging backend capability consumed by uwbctl-core.
//
// Radio-layer protocol and secure session establishment are out of scope here;
// this crate only fixes the seam (`RangingBackend` / `SessionScope`) and the
// data that crosses it. `sim` provides an in-process backend for the CLI and
// for tests.

pub mod error;
pub mod scope;
pub mod sim;
pub mod types;

pub use error::Error;
pub use scope::{EventStream, RangingBackend, SessionScope};
pub use sim::{SimConfig, SimulatedBackend};
pub use types::{Endpoint, RangingConfig, RangingEvent, RangingPosition};
