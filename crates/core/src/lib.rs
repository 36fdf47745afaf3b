//! Core primitives for ERC-4337 user operations: the draft/resolved data
//! model, the two canonical encodings, the entry-point-bound operation
//! hash, pre-verification gas accounting and revert decoding.

pub mod error;
pub mod gas;
pub mod pack;
pub mod revert;
pub mod user_operation;

pub use error::OperationError;
pub use gas::{GasOverheads, estimate_pre_verification_gas};
pub use pack::{PackMode, pack_user_op, user_op_hash};
pub use revert::{DecodedRevert, ErrorFrame, RevertData, decode_revert, enrich};
pub use user_operation::{UserOperation, UserOperationDraft};
