//! Dynamic ABI handling: method lookup, argument parsing and JSON rendering
//! of decoded values.

use alloy::{
    dyn_abi::{DynSolValue, Specifier},
    json_abi::{Event, Function, JsonAbi, Param},
    primitives::hex,
};
use anyhow::{bail, ensure, Context, Result};
use serde_json::{Map, Value};

/// Loads the ABI of a known contract.
pub fn contract_abi(contract: &str) -> Result<JsonAbi> {
    let json = tbtc_solidity_types::abi_json(contract).with_context(|| {
        format!(
            "unknown contract {contract}; known contracts: {}",
            tbtc_solidity_types::names::ALL.join(", ")
        )
    })?;
    serde_json::from_str(json).with_context(|| format!("invalid ABI of contract {contract}"))
}

/// Finds a method by its ABI name or by its snake or kebab case form.
pub fn find_function<'a>(abi: &'a JsonAbi, contract: &str, name: &str) -> Result<&'a Function> {
    let wanted = normalize(name);
    let mut matches = abi.functions().filter(|function| normalize(&function.name) == wanted);

    let Some(function) = matches.next() else {
        bail!("no method [{name}] in contract {contract}");
    };
    ensure!(
        matches.next().is_none(),
        "method [{name}] of contract {contract} is overloaded"
    );
    Ok(function)
}

/// Finds an event by its ABI name or by its snake or kebab case form.
pub fn find_event<'a>(abi: &'a JsonAbi, contract: &str, name: &str) -> Result<&'a Event> {
    let wanted = normalize(name);
    abi.events()
        .find(|event| normalize(&event.name) == wanted)
        .with_context(|| format!("no event [{name}] in contract {contract}"))
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Parses the command line arguments of `function` per the ABI types.
pub fn parse_arguments(function: &Function, args: &[String]) -> Result<Vec<DynSolValue>> {
    ensure!(
        function.inputs.len() == args.len(),
        "method {} takes {} arguments, got {}: {}",
        function.name,
        function.inputs.len(),
        args.len(),
        function.signature()
    );

    function
        .inputs
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let ty = param
                .resolve()
                .with_context(|| format!("unsupported type of argument {}", param.name))?;
            ty.coerce_str(arg).with_context(|| {
                format!("invalid value [{arg}] of argument {} ({ty})", describe(param))
            })
        })
        .collect()
}

fn describe(param: &Param) -> &str {
    if param.name.is_empty() {
        "_"
    } else {
        &param.name
    }
}

/// Renders decoded values as a JSON object keyed by parameter name, or as a
/// single value when there is exactly one unnamed parameter.
pub fn values_to_json(params: &[Param], values: &[DynSolValue]) -> Value {
    if let ([param], [value]) = (params, values) {
        if param.name.is_empty() {
            return value_to_json(value, Some(param));
        }
    }
    named_values(params.iter().map(|param| (param.name.as_str(), Some(param))), values)
}

/// Renders a single value. Tuples with named components become objects.
pub fn value_to_json(value: &DynSolValue, param: Option<&Param>) -> Value {
    match value {
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Uint(n, bits) if *bits <= 64 => Value::from(n.to::<u64>()),
        DynSolValue::Uint(n, _) => Value::String(n.to_string()),
        DynSolValue::Int(n, bits) if *bits <= 64 => Value::from(n.as_i64()),
        DynSolValue::Int(n, _) => Value::String(n.to_string()),
        DynSolValue::Address(address) => Value::String(address.to_checksum(None)),
        DynSolValue::FixedBytes(word, size) => Value::String(hex::encode_prefixed(&word[..*size])),
        DynSolValue::Bytes(bytes) => Value::String(hex::encode_prefixed(bytes)),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Function(function) => Value::String(function.to_string()),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => {
            let element = param.filter(|param| !param.components.is_empty());
            Value::Array(items.iter().map(|item| value_to_json(item, element)).collect())
        }
        DynSolValue::Tuple(items) => match param {
            Some(param)
                if param.components.len() == items.len()
                    && param.components.iter().all(|c| !c.name.is_empty()) =>
            {
                named_values(
                    param.components.iter().map(|c| (c.name.as_str(), Some(c))),
                    items,
                )
            }
            _ => Value::Array(items.iter().map(|item| value_to_json(item, None)).collect()),
        },
        #[allow(unreachable_patterns)]
        other => Value::String(format!("{other:?}")),
    }
}

fn named_values<'a>(
    params: impl Iterator<Item = (&'a str, Option<&'a Param>)>,
    values: &[DynSolValue],
) -> Value {
    let mut object = Map::new();
    for (index, ((name, param), value)) in params.zip(values).enumerate() {
        let key = if name.is_empty() {
            format!("_{index}")
        } else {
            name.to_string()
        };
        object.insert(key, value_to_json(value, param));
    }
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use alloy::{
        dyn_abi::JsonAbiExt,
        primitives::{address, U256},
    };
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case::abi_name("requestRedemption")]
    #[case::snake_case("request_redemption")]
    #[case::kebab_case("request-redemption")]
    fn methods_are_found_by_any_casing(#[case] name: &str) {
        let abi = contract_abi("Bridge").unwrap();
        assert_eq!(find_function(&abi, "Bridge", name).unwrap().name, "requestRedemption");
    }

    #[test]
    fn unknown_names_are_reported() {
        assert!(contract_abi("TokenStaking").is_err());

        let abi = contract_abi("LightRelay").unwrap();
        let err = find_function(&abi, "LightRelay", "mint").unwrap_err();
        assert_eq!(err.to_string(), "no method [mint] in contract LightRelay");
        assert!(find_event(&abi, "LightRelay", "proof-length-changed").is_ok());
    }

    #[test]
    fn parses_tuple_arguments() {
        let abi = contract_abi("Bridge").unwrap();
        let function = find_function(&abi, "Bridge", "requestRedemption").unwrap();
        let args = [
            "0x8db50eb52063ea9d98b3eac91489a90f738986f6",
            "(0x0000000000000000000000000000000000000000000000000000000000000001,1,1000000)",
            "0x160014f4eedc8f40d4b8e30771f792b065ebec0abaddef",
            "50000",
        ]
        .map(str::to_string);

        let values = parse_arguments(function, &args).unwrap();
        assert_eq!(values.len(), 4);
        assert_eq!(values[3], DynSolValue::Uint(U256::from(50_000), 64));
        assert!(function.abi_encode_input(&values).is_ok());

        let err = parse_arguments(function, &args[..2]).unwrap_err();
        assert!(err.to_string().contains("takes 4 arguments, got 2"));
    }

    #[test]
    fn renders_structs_as_objects() {
        let abi = contract_abi("Bridge").unwrap();
        let function = find_function(&abi, "Bridge", "depositParameters").unwrap();
        let values = vec![
            DynSolValue::Uint(U256::from(1_000_000), 64),
            DynSolValue::Uint(U256::from(2_000), 64),
            DynSolValue::Uint(U256::from(100_000), 64),
        ];

        let rendered = values_to_json(&function.outputs, &values);
        assert_eq!(rendered.as_object().unwrap().len(), 3);
        assert_eq!(rendered["depositDustThreshold"], json!(1_000_000));

        let governance = find_function(&abi, "Bridge", "governance").unwrap();
        let owner = address!("0x5e4861a80b55f035d899f66772117f00fa0e8e7b");
        assert_eq!(
            values_to_json(&governance.outputs, &[DynSolValue::Address(owner)]),
            json!(owner.to_checksum(None))
        );
    }

    #[test]
    fn large_integers_are_strings() {
        let value = DynSolValue::Uint(U256::MAX, 256);
        assert_eq!(value_to_json(&value, None), json!(U256::MAX.to_string()));
        assert_eq!(
            value_to_json(&DynSolValue::FixedBytes([0xab; 32].into(), 4), None),
            json!("0xabababab")
        );
    }
}
