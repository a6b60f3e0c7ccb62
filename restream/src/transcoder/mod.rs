//! Contracts of the wrapped transcoder and helpers for implementing them.

pub mod policy;
pub mod port;
pub mod skills;
pub mod traits;

pub use policy::{AddressPolicy, AddressRules};
pub use port::{PortError, PortRange};
pub use skills::{BinaryInfo, Skills};
pub use traits::{ExitCallback, Parser, ProbeParser, Status, Transcoder, Worker, WorkerConfig};
