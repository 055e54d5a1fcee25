//! Ledger call and receipt types
//!
//! Calls are untyped at this layer: a function name and a list of
//! arguments. Typed contract wrappers live with the client.

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::identity::{Address, Handle, TxHash};

/// One argument to a contract function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallArg {
    Uint(u128),
    Address(Address),
    Handle(Handle),
    Handles(Vec<Handle>),
    Bytes(Vec<u8>),
}

/// A call against a contract function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCall {
    pub contract: Address,
    pub function: String,
    pub args: Vec<CallArg>,
}

impl ContractCall {
    /// Start a call with no arguments
    pub fn new(contract: Address, function: impl Into<String>) -> Self {
        Self {
            contract,
            function: function.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument
    pub fn arg(mut self, arg: CallArg) -> Self {
        self.args.push(arg);
        self
    }

    fn bad_args(&self, reason: impl Into<String>) -> LedgerError {
        LedgerError::InvalidArguments {
            function: self.function.clone(),
            reason: reason.into(),
        }
    }

    /// Argument `index` as an unsigned integer
    pub fn uint_arg(&self, index: usize) -> Result<u128, LedgerError> {
        match self.args.get(index) {
            Some(CallArg::Uint(v)) => Ok(*v),
            _ => Err(self.bad_args(format!("argument {} must be uint", index))),
        }
    }

    /// Argument `index` as a single handle
    pub fn handle_arg(&self, index: usize) -> Result<Handle, LedgerError> {
        match self.args.get(index) {
            Some(CallArg::Handle(h)) => Ok(*h),
            _ => Err(self.bad_args(format!("argument {} must be a handle", index))),
        }
    }

    /// Argument `index` as a handle list
    pub fn handles_arg(&self, index: usize) -> Result<&[Handle], LedgerError> {
        match self.args.get(index) {
            Some(CallArg::Handles(hs)) => Ok(hs),
            _ => Err(self.bad_args(format!("argument {} must be a handle list", index))),
        }
    }

    /// Argument `index` as raw bytes
    pub fn bytes_arg(&self, index: usize) -> Result<&[u8], LedgerError> {
        match self.args.get(index) {
            Some(CallArg::Bytes(b)) => Ok(b),
            _ => Err(self.bad_args(format!("argument {} must be bytes", index))),
        }
    }
}

/// Value returned by a view function or carried by an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallValue {
    Unit,
    Uint(u128),
    Address(Address),
    Handle(Handle),
    Tuple(Vec<CallValue>),
}

impl CallValue {
    fn unexpected(function: &str, expected: &str) -> LedgerError {
        LedgerError::UnexpectedReturn {
            function: function.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Interpret as an unsigned integer
    pub fn into_uint(self, function: &str) -> Result<u128, LedgerError> {
        match self {
            CallValue::Uint(v) => Ok(v),
            _ => Err(Self::unexpected(function, "uint")),
        }
    }

    /// Interpret as a handle
    pub fn into_handle(self, function: &str) -> Result<Handle, LedgerError> {
        match self {
            CallValue::Handle(h) => Ok(h),
            _ => Err(Self::unexpected(function, "handle")),
        }
    }

    /// Interpret as a tuple of exactly `arity` elements
    pub fn into_tuple(self, function: &str, arity: usize) -> Result<Vec<CallValue>, LedgerError> {
        match self {
            CallValue::Tuple(items) if items.len() == arity => Ok(items),
            _ => Err(Self::unexpected(function, &format!("tuple of {}", arity))),
        }
    }
}

/// An event emitted by an included transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub name: String,
    pub args: Vec<CallValue>,
}

/// Inclusion receipt for a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    /// Block timestamp, unix seconds
    pub timestamp: i64,
    pub events: Vec<LedgerEvent>,
}

impl TxReceipt {
    /// First event with the given name
    pub fn event(&self, name: &str) -> Option<&LedgerEvent> {
        self.events.iter().find(|e| e.name == name)
    }

    /// First event with the given name, or an error naming it
    pub fn require_event(&self, name: &str) -> Result<&LedgerEvent, LedgerError> {
        self.event(name)
            .ok_or_else(|| LedgerError::MissingEvent(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_builder_and_accessors() {
        let call = ContractCall::new(Address::new([1; 20]), "like")
            .arg(CallArg::Uint(3))
            .arg(CallArg::Handle(Handle::new([2; 32])))
            .arg(CallArg::Bytes(vec![9]));

        assert_eq!(call.uint_arg(0).unwrap(), 3);
        assert_eq!(call.handle_arg(1).unwrap(), Handle::new([2; 32]));
        assert_eq!(call.bytes_arg(2).unwrap(), &[9]);
        assert!(matches!(
            call.uint_arg(1),
            Err(LedgerError::InvalidArguments { .. })
        ));
        assert!(call.handles_arg(5).is_err());
    }

    #[test]
    fn test_call_value_conversions() {
        assert_eq!(CallValue::Uint(4).into_uint("f").unwrap(), 4);
        assert!(CallValue::Unit.into_uint("f").is_err());

        let tuple = CallValue::Tuple(vec![CallValue::Uint(1), CallValue::Uint(2)]);
        assert_eq!(tuple.clone().into_tuple("f", 2).unwrap().len(), 2);
        assert!(tuple.into_tuple("f", 3).is_err());
    }

    #[test]
    fn test_receipt_event_lookup() {
        let receipt = TxReceipt {
            tx_hash: TxHash::new([0; 32]),
            block_number: 1,
            timestamp: 0,
            events: vec![LedgerEvent {
                name: "PoemPublished".to_string(),
                args: vec![CallValue::Uint(0)],
            }],
        };
        assert!(receipt.event("PoemPublished").is_some());
        assert!(matches!(
            receipt.require_event("PoemLiked"),
            Err(LedgerError::MissingEvent(_))
        ));
    }
}
