pub mod abi;
pub mod binding;
pub mod domain;
pub mod edtech;
pub mod error;
pub mod events;
pub mod manager;
pub mod network;
pub mod ports;
pub mod state_machine;
pub mod submitter;
pub mod units;

pub use binding::{ContractBinding, ContractHandle, ContractInterface, MethodHandle};
pub use domain::{
    ChainId, ConnectionState, ConnectionStatus, EventKind, NetworkSpec, PendingSubmission,
    ProviderEvent, Receipt,
};
pub use edtech::{edtech_interface, AmountPolicy, EdTechClient};
pub use error::{
    AmountError, BindingError, CallError, ConnectError, NetworkError, SubmitError, TransitionError,
};
pub use events::{EventBridge, SubscriptionSet};
pub use manager::ConnectionManager;
pub use network::{NetworkPolicy, SwitchOutcome};
pub use ports::{EventHandler, PortError, ProviderPort};
pub use state_machine::{ConnectionAction, StateTransition};
pub use submitter::{GasPolicy, TransactionSubmitter};
