//! Client side of the pipeline: the operation builder that assembles and
//! signs user operations, and the JSON-RPC client that hands them to a
//! bundler.

pub mod builder;
pub mod bundler;

pub use builder::{DEFAULT_VERIFICATION_GAS_LIMIT, ExecuteRequest, GasOracle, OperationBuilder};
pub use bundler::{BundlerClient, GasEstimate};
