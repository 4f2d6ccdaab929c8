//! JSON argument values to ABI values for bound contract methods.

use std::str::FromStr;

use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::json_abi::Function;
use alloy::primitives::{Address, Bytes, B256, I256, U256};
use serde_json::Value;

/// `name(type1,type2)` as used for overload selection.
pub fn function_signature(function: &Function) -> String {
    let inputs: Vec<&str> = function.inputs.iter().map(|i| i.ty.as_str()).collect();
    format!("{}({})", function.name, inputs.join(","))
}

/// Converts positional JSON arguments to ABI values for `function`.
pub fn encode_arguments(function: &Function, args: &[Value]) -> Result<Vec<DynSolValue>, String> {
    if function.inputs.len() != args.len() {
        return Err(format!(
            "{} expects {} arguments, got {}",
            function.name,
            function.inputs.len(),
            args.len()
        ));
    }
    function
        .inputs
        .iter()
        .zip(args)
        .map(|(input, arg)| {
            let ty: DynSolType = input
                .ty
                .parse()
                .map_err(|e| format!("unsupported type '{}': {e}", input.ty))?;
            parse_dyn_value(arg, &ty).map_err(|e| format!("argument '{}': {e}", input.name))
        })
        .collect()
}

fn parse_uint(value: &Value) -> Result<U256, String> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return Err("expected uint string/number".to_owned()),
    };
    match raw.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str(&raw),
    }
    .map_err(|e| format!("invalid uint: {e}"))
}

fn parse_dyn_value(value: &Value, ty: &DynSolType) -> Result<DynSolValue, String> {
    match ty {
        DynSolType::Bool => value
            .as_bool()
            .map(DynSolValue::Bool)
            .ok_or_else(|| "expected bool".to_owned()),
        DynSolType::Uint(bits) => parse_uint(value).map(|x| DynSolValue::Uint(x, *bits)),
        DynSolType::Int(bits) => {
            let raw = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                _ => return Err("expected int string/number".to_owned()),
            };
            I256::from_str(&raw)
                .map(|x| DynSolValue::Int(x, *bits))
                .map_err(|e| format!("invalid int: {e}"))
        }
        DynSolType::Address => value
            .as_str()
            .ok_or_else(|| "expected address string".to_owned())
            .and_then(|s| {
                Address::from_str(s)
                    .map(DynSolValue::Address)
                    .map_err(|e| format!("invalid address: {e}"))
            }),
        DynSolType::FixedBytes(size) => value
            .as_str()
            .ok_or_else(|| "expected fixed bytes string".to_owned())
            .and_then(|s| {
                let raw = Bytes::from_str(s).map_err(|e| format!("invalid fixed bytes: {e}"))?;
                if raw.len() != *size {
                    return Err(format!("expected {size} bytes, got {}", raw.len()));
                }
                let mut word = B256::ZERO;
                word[..*size].copy_from_slice(&raw);
                Ok(DynSolValue::FixedBytes(word, *size))
            }),
        DynSolType::Bytes => value
            .as_str()
            .ok_or_else(|| "expected bytes string".to_owned())
            .and_then(|s| {
                Bytes::from_str(s)
                    .map(|x| DynSolValue::Bytes(x.to_vec()))
                    .map_err(|e| format!("invalid bytes: {e}"))
            }),
        DynSolType::String => value
            .as_str()
            .map(|s| DynSolValue::String(s.to_owned()))
            .ok_or_else(|| "expected string".to_owned()),
        DynSolType::Array(inner) => {
            let arr = value
                .as_array()
                .ok_or_else(|| "expected array".to_owned())?;
            arr.iter()
                .map(|v| parse_dyn_value(v, inner))
                .collect::<Result<Vec<_>, _>>()
                .map(DynSolValue::Array)
        }
        DynSolType::FixedArray(inner, size) => {
            let arr = value
                .as_array()
                .ok_or_else(|| "expected array".to_owned())?;
            if arr.len() != *size {
                return Err(format!(
                    "fixed array length mismatch: expected {size}, got {}",
                    arr.len()
                ));
            }
            arr.iter()
                .map(|v| parse_dyn_value(v, inner))
                .collect::<Result<Vec<_>, _>>()
                .map(DynSolValue::FixedArray)
        }
        DynSolType::Tuple(inner) => {
            let arr = value
                .as_array()
                .ok_or_else(|| "expected tuple array".to_owned())?;
            if arr.len() != inner.len() {
                return Err(format!(
                    "tuple length mismatch: expected {}, got {}",
                    inner.len(),
                    arr.len()
                ));
            }
            arr.iter()
                .zip(inner)
                .map(|(v, t)| parse_dyn_value(v, t))
                .collect::<Result<Vec<_>, _>>()
                .map(DynSolValue::Tuple)
        }
        other => Err(format!("type {other:?} not supported")),
    }
}
