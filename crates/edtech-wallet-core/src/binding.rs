use std::collections::BTreeMap;
use std::sync::Arc;

use alloy::dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy::json_abi::{Function, JsonAbi, StateMutability};
use alloy::primitives::{Address, Bytes};
use serde_json::Value;

use crate::abi::{encode_arguments, function_signature};
use crate::domain::ChainId;
use crate::error::{BindingError, CallError};
use crate::network::NetworkPolicy;

/// A contract interface with its method registry resolved up front.
///
/// Methods are addressable by bare name (first overload wins) or by full
/// signature, e.g. `hasPurchased(uint256,address)`.
#[derive(Debug, Clone)]
pub struct ContractInterface {
    abi: JsonAbi,
    methods: BTreeMap<String, Function>,
}

impl ContractInterface {
    pub fn from_json(abi_json: &str) -> Result<Self, BindingError> {
        let abi: JsonAbi = serde_json::from_str(abi_json)
            .map_err(|e| BindingError::InvalidDescriptor(format!("invalid abi json: {e}")))?;
        Ok(Self::from_abi(abi))
    }

    pub fn from_abi(abi: JsonAbi) -> Self {
        let mut methods = BTreeMap::new();
        for function in abi.functions() {
            methods
                .entry(function.name.clone())
                .or_insert_with(|| function.clone());
            methods.insert(function_signature(function), function.clone());
        }
        Self { abi, methods }
    }

    /// Rejects the interface eagerly when a method or event the caller
    /// depends on is missing.
    pub fn require(self, methods: &[&str], events: &[&str]) -> Result<Self, BindingError> {
        if let Some(missing) = methods.iter().find(|m| !self.methods.contains_key(**m)) {
            return Err(BindingError::UnknownMethod((*missing).to_owned()));
        }
        if let Some(missing) = events.iter().find(|e| self.abi.event(e).is_none()) {
            return Err(BindingError::InvalidDescriptor(format!(
                "missing event: {missing}"
            )));
        }
        Ok(self)
    }

    pub fn function(&self, name: &str) -> Result<&Function, BindingError> {
        self.methods
            .get(name)
            .ok_or_else(|| BindingError::UnknownMethod(name.to_owned()))
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.abi.event(name).is_some()
    }
}

/// The (interface, deployment address per chain) pair a deployment is
/// configured with. Produces handles bound to one chain at a time.
#[derive(Debug, Clone)]
pub struct ContractBinding {
    interface: Arc<ContractInterface>,
    deployments: BTreeMap<ChainId, Address>,
}

impl ContractBinding {
    pub fn new(interface: ContractInterface) -> Self {
        Self {
            interface: Arc::new(interface),
            deployments: BTreeMap::new(),
        }
    }

    pub fn with_deployment(mut self, chain_id: ChainId, address: Address) -> Self {
        self.deployments.insert(chain_id, address);
        self
    }

    pub fn address_for(&self, chain_id: ChainId) -> Option<Address> {
        self.deployments.get(&chain_id).copied()
    }

    pub fn interface(&self) -> &ContractInterface {
        &self.interface
    }

    /// Binds the deployment for `chain_id`. A supported chain without a
    /// configured address cannot be bound either.
    pub fn bind(
        &self,
        policy: &NetworkPolicy,
        chain_id: ChainId,
        generation: u64,
    ) -> Result<ContractHandle, BindingError> {
        let address = self
            .address_for(chain_id)
            .ok_or(BindingError::UnsupportedChain(chain_id))?;
        ContractHandle::bind(
            policy,
            address,
            Arc::clone(&self.interface),
            chain_id,
            generation,
        )
    }
}

#[derive(Debug, Clone)]
pub struct ContractDescriptor {
    pub address: Address,
    pub interface: Arc<ContractInterface>,
    pub bound_chain_id: ChainId,
}

/// A contract bound to one chain and one binding generation.
#[derive(Debug, Clone)]
pub struct ContractHandle {
    descriptor: ContractDescriptor,
    generation: u64,
}

impl ContractHandle {
    pub fn bind(
        policy: &NetworkPolicy,
        address: Address,
        interface: Arc<ContractInterface>,
        chain_id: ChainId,
        generation: u64,
    ) -> Result<Self, BindingError> {
        if !policy.is_supported(chain_id) {
            return Err(BindingError::UnsupportedChain(chain_id));
        }
        Ok(Self {
            descriptor: ContractDescriptor {
                address,
                interface,
                bound_chain_id: chain_id,
            },
            generation,
        })
    }

    pub fn address(&self) -> Address {
        self.descriptor.address
    }

    pub fn bound_chain_id(&self) -> ChainId {
        self.descriptor.bound_chain_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn method_handle(&self, name: &str) -> Result<MethodHandle, BindingError> {
        let function = self.descriptor.interface.function(name)?.clone();
        Ok(MethodHandle {
            function,
            address: self.descriptor.address,
            chain_id: self.descriptor.bound_chain_id,
        })
    }

    /// Guards every invocation: the handle must match the live chain and
    /// the live binding generation.
    pub fn ensure_bound(
        &self,
        live_chain: Option<ChainId>,
        live_generation: u64,
    ) -> Result<(), CallError> {
        if live_chain != Some(self.descriptor.bound_chain_id) || live_generation != self.generation
        {
            return Err(CallError::NotBound);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MethodHandle {
    function: Function,
    address: Address,
    chain_id: ChainId,
}

impl MethodHandle {
    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn is_payable(&self) -> bool {
        self.function.state_mutability == StateMutability::Payable
    }

    pub fn is_read_only(&self) -> bool {
        matches!(
            self.function.state_mutability,
            StateMutability::View | StateMutability::Pure
        )
    }

    /// Selector plus ABI-encoded arguments.
    pub fn encode(&self, args: &[Value]) -> Result<Bytes, CallError> {
        let values = encode_arguments(&self.function, args).map_err(CallError::InvalidArguments)?;
        let encoded = self
            .function
            .abi_encode_input(&values)
            .map_err(|e| CallError::InvalidArguments(format!("abi encoding failed: {e}")))?;
        Ok(Bytes::from(encoded))
    }

    pub fn decode(&self, output: &[u8]) -> Result<Vec<DynSolValue>, CallError> {
        self.function
            .abi_decode_output(output, true)
            .map_err(|e| CallError::Decode(format!("{}: {e}", self.function.name)))
    }
}
