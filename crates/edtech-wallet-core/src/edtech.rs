//! Typed operations for the EdTech donation contract.

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Address, U256};
use serde_json::json;
use tracing::info;

use crate::binding::ContractInterface;
use crate::domain::{ConnectionState, ContractStats, DonationRecord, Receipt};
use crate::error::{BindingError, CallError, NetworkError, SubmitError};
use crate::manager::ConnectionManager;
use crate::ports::ProviderPort;
use crate::units::{from_smallest_unit, to_smallest_unit};

pub const EDTECH_ABI: &str = include_str!("../abi/EdTechDonation.json");

pub const DEFAULT_DONATION_PURPOSE: &str = "EdTech Donation";

const REQUIRED_METHODS: [&str; 8] = [
    "donate",
    "purchaseCourse",
    "hasPurchased",
    "coursePrice",
    "getStats",
    "getDonation",
    "getDonationCount",
    "getContractBalance",
];
const REQUIRED_EVENTS: [&str; 2] = ["DonationReceived", "CoursePurchased"];

/// Loads the built-in EdTechDonation interface and checks the surface the
/// client relies on.
pub fn edtech_interface() -> Result<ContractInterface, BindingError> {
    ContractInterface::from_json(EDTECH_ABI)?.require(&REQUIRED_METHODS, &REQUIRED_EVENTS)
}

/// Lower bound for donations, in smallest units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountPolicy {
    pub min_donation: U256,
}

impl Default for AmountPolicy {
    fn default() -> Self {
        Self {
            min_donation: U256::from(1u8),
        }
    }
}

pub struct EdTechClient<'a, P> {
    manager: &'a ConnectionManager<P>,
    amounts: AmountPolicy,
}

impl<'a, P> EdTechClient<'a, P>
where
    P: ProviderPort + 'static,
{
    pub fn new(manager: &'a ConnectionManager<P>, amounts: AmountPolicy) -> Self {
        Self { manager, amounts }
    }

    /// Donates `amount` (decimal, in the active network's currency) and
    /// waits for confirmation.
    pub async fn donate(&self, amount: &str, purpose: Option<&str>) -> Result<Receipt, SubmitError> {
        let value = self.parse_amount(amount).await?;
        if value < self.amounts.min_donation {
            return Err(SubmitError::InvalidAmount(format!(
                "donation of {amount} is below the minimum of {} smallest units",
                self.amounts.min_donation
            )));
        }
        let purpose = purpose.unwrap_or(DEFAULT_DONATION_PURPOSE);
        info!(%value, purpose, "submitting donation");
        self.manager
            .submit_and_confirm("donate", vec![json!(purpose)], value)
            .await
    }

    /// Sends `amount` of the active network's currency to `to` and waits
    /// for confirmation.
    pub async fn send_payment(&self, to: Address, amount: &str) -> Result<Receipt, SubmitError> {
        let value = self.parse_amount(amount).await?;
        info!(%to, %value, "sending payment");
        let pending = self.manager.transfer(to, value).await?;
        self.manager.confirm(pending).await
    }

    async fn parse_amount(&self, amount: &str) -> Result<U256, SubmitError> {
        let state = self.manager.current_state().await;
        let chain_id = match (state.is_connected(), state.chain_id) {
            (true, Some(chain_id)) => chain_id,
            _ => return Err(SubmitError::NotConnected),
        };
        Ok(to_smallest_unit(
            amount,
            self.manager.policy().decimals_for(chain_id),
        )?)
    }

    /// Pays exactly the on-chain course price.
    pub async fn purchase_course(&self, course_id: u64) -> Result<Receipt, SubmitError> {
        let price = self.course_price_raw().await?;
        info!(course_id, %price, "purchasing course");
        self.manager
            .submit_and_confirm("purchaseCourse", vec![json!(course_id.to_string())], price)
            .await
    }

    /// `false` when no wallet is connected.
    pub async fn has_purchased(&self, course_id: u64) -> Result<bool, CallError> {
        let state = self.manager.current_state().await;
        let Some(account) = state.account.filter(|_| state.is_connected()) else {
            return Ok(false);
        };
        let out = self
            .manager
            .call(
                "hasPurchased",
                vec![json!(course_id.to_string()), json!(account.to_string())],
            )
            .await?;
        first(&out)?
            .as_bool()
            .ok_or_else(|| CallError::Decode("hasPurchased: expected bool".to_owned()))
    }

    pub async fn course_price_raw(&self) -> Result<U256, CallError> {
        let out = self.manager.call("coursePrice", Vec::new()).await?;
        uint_at(&out, 0, "coursePrice")
    }

    /// Course price as a decimal string in the active network's currency.
    pub async fn course_price(&self) -> Result<String, CallError> {
        let price = self.course_price_raw().await?;
        self.format_amount(price).await
    }

    pub async fn stats(&self) -> Result<ContractStats, CallError> {
        let out = self.manager.call("getStats", Vec::new()).await?;
        Ok(ContractStats {
            total_donations_count: uint_at(&out, 0, "getStats")?,
            total_donations_amount: uint_at(&out, 1, "getStats")?,
            total_allocated_amount: uint_at(&out, 2, "getStats")?,
            total_withdrawn_amount: uint_at(&out, 3, "getStats")?,
            contract_balance: uint_at(&out, 4, "getStats")?,
        })
    }

    pub async fn donation(&self, donation_id: u64) -> Result<DonationRecord, CallError> {
        let out = self
            .manager
            .call("getDonation", vec![json!(donation_id.to_string())])
            .await?;
        let donor = out
            .get(1)
            .and_then(DynSolValue::as_address)
            .ok_or_else(|| decode_error("getDonation", "donor"))?;
        let purpose = out
            .get(3)
            .and_then(DynSolValue::as_str)
            .ok_or_else(|| decode_error("getDonation", "purpose"))?;
        let status = u8::try_from(uint_at(&out, 4, "getDonation")?)
            .map_err(|_| decode_error("getDonation", "status"))?;
        let timestamp = u64::try_from(uint_at(&out, 5, "getDonation")?)
            .map_err(|_| decode_error("getDonation", "timestamp"))?;
        Ok(DonationRecord {
            id: uint_at(&out, 0, "getDonation")?,
            donor,
            amount: uint_at(&out, 2, "getDonation")?,
            purpose: purpose.to_owned(),
            status,
            timestamp,
        })
    }

    pub async fn donation_count(&self) -> Result<U256, CallError> {
        let out = self.manager.call("getDonationCount", Vec::new()).await?;
        uint_at(&out, 0, "getDonationCount")
    }

    pub async fn contract_balance(&self) -> Result<U256, CallError> {
        let out = self.manager.call("getContractBalance", Vec::new()).await?;
        uint_at(&out, 0, "getContractBalance")
    }

    /// Switches to the configured target network unless the wallet is
    /// already on a supported one.
    pub async fn ensure_target_network(&self) -> Result<ConnectionState, NetworkError> {
        let state = self.manager.current_state().await;
        if state.network_supported {
            return Ok(state);
        }
        let target = self.manager.policy().target_chain();
        info!(from = ?state.chain_id, to = target, "switching to target network");
        self.manager.switch_network(target).await
    }

    async fn format_amount(&self, value: U256) -> Result<String, CallError> {
        let state = self.manager.current_state().await;
        let decimals = state
            .chain_id
            .map(|id| self.manager.policy().decimals_for(id))
            .unwrap_or(crate::network::DEFAULT_DECIMALS);
        from_smallest_unit(value, decimals).map_err(|e| CallError::Decode(e.to_string()))
    }
}

fn decode_error(method: &str, field: &str) -> CallError {
    CallError::Decode(format!("{method}: unexpected {field}"))
}

fn first(values: &[DynSolValue]) -> Result<&DynSolValue, CallError> {
    values
        .first()
        .ok_or_else(|| CallError::Decode("empty output".to_owned()))
}

fn uint_at(values: &[DynSolValue], index: usize, method: &str) -> Result<U256, CallError> {
    values
        .get(index)
        .and_then(DynSolValue::as_uint)
        .map(|(value, _)| value)
        .ok_or_else(|| CallError::Decode(format!("{method}: expected uint at {index}")))
}
