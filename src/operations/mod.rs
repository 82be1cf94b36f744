//! Request-to-pay and transfer submission, and status polling.

pub mod collection;
pub mod disbursement;
pub mod dispatcher;
pub mod poller;

pub use collection::Collection;
pub use disbursement::Disbursement;
pub use dispatcher::{OperationDispatcher, OperationKind};
pub use poller::{PollConfig, PollOutcome, StatusPoller, StatusSource};
