//! Implementations of the subcommands.

use std::{collections::HashMap, future::Future, net::SocketAddr};

use alloy::{
    dyn_abi::{DecodedEvent, EventExt, FunctionExt, JsonAbiExt},
    eips::BlockId,
    json_abi::{Event, Function, Param, StateMutability},
    primitives::B256,
    rpc::types::{Filter, Log},
};
use anyhow::{ensure, Context, Result};
use prometheus::{Encoder, TextEncoder};
use serde_json::{json, Map, Value};
use tbtc_contracts::Chain;
use tbtc_ethutil::{SubscribeOpts, SubscriptionHandle, TransactionOptions};
use tokio::sync::mpsc;
use warp::Filter as _;

use crate::{
    abi::{contract_abi, find_event, find_function, parse_arguments, value_to_json, values_to_json},
    cli::{EventsCmd, InvokeCmd},
};

const WATCH_BUFFER: usize = 256;

/// Lists the methods of `contract`, one signature per line.
pub fn methods(contract: &str) -> Result<Vec<String>> {
    let abi = contract_abi(contract)?;
    let mut lines: Vec<String> = abi.functions().map(describe_function).collect();
    lines.sort();
    Ok(lines)
}

fn describe_function(function: &Function) -> String {
    let params = |params: &[Param]| {
        params
            .iter()
            .map(|param| match param.name.as_str() {
                "" => param.selector_type().into_owned(),
                name => format!("{} {name}", param.selector_type()),
            })
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mutability = match function.state_mutability {
        StateMutability::Pure => "pure",
        StateMutability::View => "view",
        StateMutability::NonPayable => "nonpayable",
        StateMutability::Payable => "payable",
    };

    let mut line = format!("{}({})", function.name, params(&function.inputs));
    if !function.outputs.is_empty() {
        line.push_str(&format!(" returns ({})", params(&function.outputs)));
    }
    line.push_str(&format!(" [{mutability}]"));
    line
}

/// Calls, simulates, estimates or submits a contract method.
///
/// Constant methods are called at `--block`. State changing methods are
/// simulated unless `--submit` or `--estimate-gas` is given.
pub async fn invoke(chain: &Chain, cmd: &InvokeCmd) -> Result<Value> {
    let abi = contract_abi(&cmd.contract)?;
    let function = find_function(&abi, &cmd.contract, &cmd.method)?;
    let values = parse_arguments(function, &cmd.args)?;
    let input = function.abi_encode_input(&values)?;
    let contract = chain.bound_contract(&cmd.contract)?;
    let block = cmd.block.map_or_else(BlockId::latest, BlockId::number);

    let constant = matches!(
        function.state_mutability,
        StateMutability::View | StateMutability::Pure
    );
    let value = cmd.value();
    ensure!(
        value.is_zero() || function.state_mutability == StateMutability::Payable,
        "method {} is not payable",
        function.name
    );
    ensure!(
        !constant || !(cmd.submit || cmd.estimate_gas),
        "method {} is constant; it can only be called",
        function.name
    );

    if cmd.estimate_gas {
        let gas = contract.estimate_gas_raw(input.into(), value).await?;
        return Ok(json!({ "gas": gas }));
    }

    if cmd.submit {
        let options = TransactionOptions::default().with_value(value);
        let submitted = contract
            .transact_raw(&function.name, input.into(), &options)
            .await?;
        return Ok(json!({
            "transaction_hash": submitted.hash.to_string(),
            "nonce": submitted.nonce,
        }));
    }

    let output = contract.call_raw(input.into(), value, block).await?;
    let decoded = function
        .abi_decode_output(&output)
        .with_context(|| format!("failed to decode output of {}", function.name))?;
    Ok(values_to_json(&function.outputs, &decoded))
}

/// Fetches past events of one kind and renders them as JSON.
pub async fn events(chain: &Chain, cmd: &EventsCmd) -> Result<Vec<Value>> {
    let abi = contract_abi(&cmd.contract)?;
    let event = find_event(&abi, &cmd.contract, &cmd.event)?;
    let contract = chain.bound_contract(&cmd.contract)?;
    let backend = chain.backend();

    let end = match cmd.to_block {
        Some(end) => end,
        None => backend.block_number().await?,
    };
    let filter = Filter::new()
        .address(contract.address())
        .event_signature(event.selector())
        .from_block(cmd.from_block)
        .to_block(end);

    backend
        .logs(filter)
        .await?
        .iter()
        .map(|log| render_log(event, log))
        .collect()
}

/// Follows every event of the configured contracts until interrupted, and
/// serves the metrics on `metrics_addr` meanwhile.
pub async fn watch(chain: &Chain, contracts: &[String], metrics_addr: SocketAddr) -> Result<()> {
    let interrupted = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("interrupted; stopping event subscriptions"),
            Err(err) => tracing::error!("failed to listen for the interrupt signal: {err}"),
        }
    };
    watch_until(chain, contracts, metrics_addr, interrupted).await
}

/// Same as [`watch`], stopping once `shutdown` completes.
pub async fn watch_until(
    chain: &Chain,
    contracts: &[String],
    metrics_addr: SocketAddr,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let (sender, mut receiver) = mpsc::channel::<Log>(WATCH_BUFFER);
    let mut events: HashMap<B256, (String, Event)> = HashMap::new();
    let mut handles: Vec<SubscriptionHandle> = Vec::new();

    for name in contracts {
        let Ok(abi) = contract_abi(name) else {
            tracing::warn!(contract = %name, "skipping contract without known ABI");
            continue;
        };
        for event in abi.events() {
            events.insert(event.selector(), (name.clone(), event.clone()));
        }

        let contract = chain.bound_contract(name)?;
        tracing::info!(contract = %name, address = %contract.address(), "watching contract events");
        handles.push(contract.logs(SubscribeOpts::default()).pipe(sender.clone()));
    }
    drop(sender);
    ensure!(!handles.is_empty(), "no contract with a known ABI is configured");

    let metrics_server = serve_metrics(metrics_addr);
    tokio::pin!(metrics_server);
    let mut serving_metrics = true;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut metrics_server, if serving_metrics => {
                tracing::warn!("metrics server stopped");
                serving_metrics = false;
            }
            () = &mut shutdown => break,
            log = receiver.recv() => {
                let Some(log) = log else { break };
                log_event(&events, &log);
            }
        }
    }

    for handle in handles {
        handle.unsubscribe();
    }
    Ok(())
}

fn log_event(events: &HashMap<B256, (String, Event)>, log: &Log) {
    let known = log.topics().first().and_then(|topic| events.get(topic));
    let Some((contract, event)) = known else {
        tracing::debug!(address = %log.address(), "ignoring log of unknown event");
        return;
    };

    match render_log(event, log) {
        Ok(rendered) => tracing::info!(%contract, event = %event.name, "{rendered}"),
        Err(err) => tracing::warn!(%contract, event = %event.name, "failed to decode event: {err:#}"),
    }
}

/// Decodes `log` as `event` into a JSON object with the log metadata and the
/// event arguments by name.
pub fn render_log(event: &Event, log: &Log) -> Result<Value> {
    let DecodedEvent { indexed, body, .. } = event
        .decode_log(log.data())
        .with_context(|| format!("invalid {} log", event.name))?;

    let mut indexed = indexed.iter();
    let mut body = body.iter();
    let mut args = Map::new();
    for (index, input) in event.inputs.iter().enumerate() {
        let value = if input.indexed {
            indexed.next()
        } else {
            body.next()
        };
        let Some(value) = value else { break };
        let key = if input.name.is_empty() {
            format!("_{index}")
        } else {
            input.name.clone()
        };
        args.insert(key, value_to_json(value, None));
    }

    Ok(json!({
        "event": event.name,
        "block_number": log.block_number,
        "transaction_hash": log.transaction_hash.map(|hash| hash.to_string()),
        "log_index": log.log_index,
        "args": args,
    }))
}

async fn serve_metrics(addr: SocketAddr) {
    let metrics_route = warp::path("metrics").map(|| {
        let mut buffer = Vec::new();
        if let Err(err) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
            tracing::error!("failed to encode metrics: {err}");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    });

    tracing::info!("metrics available at http://{addr}/metrics");
    warp::serve(metrics_route).run(addr).await;
}
