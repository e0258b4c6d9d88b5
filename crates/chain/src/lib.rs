pub mod abi;
pub mod devchain;
pub mod ens;

use anyhow::Context;
use anyhow_source_location::{format_context, format_error};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn endpoint_logger<'a>(
    progress_bar: &'a mut printer::MultiProgressBar,
    endpoint: &str,
) -> console::Logger<'a> {
    console::Logger::new_progress(progress_bar, endpoint.into())
}

/// Default gas limit for deployment and permission transactions. The dev
/// chain mines every transaction immediately so the value is generous.
const TRANSACTION_GAS: &str = "0x6691b7";

const RECEIPT_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(500);
const RECEIPT_POLL_ATTEMPTS: usize = 120;

#[derive(Debug, Serialize)]
struct Request<'a> {
    jsonrpc: &'a str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Response {
    result: Option<serde_json::Value>,
    error: Option<ErrorBody>,
}

/// Blocking JSON-RPC connection to an Ethereum endpoint.
#[derive(Debug, Clone)]
pub struct Provider {
    pub endpoint: Arc<str>,
    client: reqwest::blocking::Client,
}

impl Provider {
    pub fn new(endpoint: &str) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context(format_context!("Failed to create http client for {endpoint}"))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn rpc(&self, method: &str, params: serde_json::Value) -> anyhow::Result<serde_json::Value> {
        let request = Request {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        let response = self
            .client
            .post(self.endpoint.as_ref())
            .json(&request)
            .send()
            .context(format_context!("Failed to reach {} for {method}", self.endpoint))?;

        let body: Response = response
            .json()
            .context(format_context!("Failed to parse {method} response"))?;

        if let Some(error) = body.error {
            return Err(format_error!("{method} failed: {}", error.message));
        }

        body.result
            .ok_or(format_error!("{method} returned no result"))
    }

    /// Connectivity probe used by the chain connector before falling back to
    /// a local dev chain.
    pub fn is_reachable(&self) -> bool {
        self.rpc("net_version", serde_json::json!([])).is_ok()
    }

    pub fn get_accounts(&self) -> anyhow::Result<Vec<Arc<str>>> {
        let result = self
            .rpc("eth_accounts", serde_json::json!([]))
            .context(format_context!("while fetching accounts"))?;
        let accounts: Vec<Arc<str>> = serde_json::from_value(result)
            .context(format_context!("eth_accounts returned a non-address list"))?;
        Ok(accounts)
    }

    pub fn send_transaction(
        &self,
        from: &str,
        to: Option<&str>,
        data: &str,
    ) -> anyhow::Result<Arc<str>> {
        let mut transaction = serde_json::json!({
            "from": from,
            "data": data,
            "gas": TRANSACTION_GAS,
        });
        if let Some(to) = to {
            transaction["to"] = serde_json::json!(to);
        }

        let result = self
            .rpc("eth_sendTransaction", serde_json::json!([transaction]))
            .context(format_context!("while sending transaction from {from}"))?;

        let hash: Arc<str> = serde_json::from_value(result)
            .context(format_context!("eth_sendTransaction returned a non-hash"))?;
        Ok(hash)
    }

    pub fn call(&self, to: &str, data: &str) -> anyhow::Result<Arc<str>> {
        let result = self
            .rpc(
                "eth_call",
                serde_json::json!([{ "to": to, "data": data }, "latest"]),
            )
            .context(format_context!("while calling contract {to}"))?;
        let output: Arc<str> = serde_json::from_value(result)
            .context(format_context!("eth_call returned non-hex output"))?;
        Ok(output)
    }

    pub fn get_logs(&self, address: &str, topic: &str) -> anyhow::Result<Vec<serde_json::Value>> {
        let result = self
            .rpc(
                "eth_getLogs",
                serde_json::json!([{
                    "fromBlock": "0x0",
                    "toBlock": "latest",
                    "address": address,
                    "topics": [topic],
                }]),
            )
            .context(format_context!("while fetching logs from {address}"))?;
        let logs: Vec<serde_json::Value> = serde_json::from_value(result)
            .context(format_context!("eth_getLogs returned a non-list"))?;
        Ok(logs)
    }

    pub fn wait_for_receipt(
        &self,
        progress_bar: &mut printer::MultiProgressBar,
        transaction_hash: &str,
    ) -> anyhow::Result<serde_json::Value> {
        for _ in 0..RECEIPT_POLL_ATTEMPTS {
            let receipt = self
                .rpc(
                    "eth_getTransactionReceipt",
                    serde_json::json!([transaction_hash]),
                )
                .ok();

            if let Some(receipt) = receipt {
                if !receipt.is_null() {
                    return Ok(receipt);
                }
            }

            progress_bar.increment(1);
            std::thread::sleep(RECEIPT_POLL_INTERVAL);
        }

        Err(format_error!(
            "Transaction {transaction_hash} was not mined within {} attempts",
            RECEIPT_POLL_ATTEMPTS
        ))
    }

    /// Deploys a compiled contract and returns its address. Constructor
    /// arguments are appended to the bytecode already ABI encoded.
    pub fn deploy_contract(
        &self,
        progress_bar: &mut printer::MultiProgressBar,
        name: &str,
        bytecode: &str,
        constructor_args: &[abi::Token],
    ) -> anyhow::Result<Arc<str>> {
        let accounts = self
            .get_accounts()
            .context(format_context!("while deploying {name}"))?;
        let from = accounts
            .first()
            .ok_or(format_error!("No unlocked accounts available on the chain"))?;

        let mut data = String::from(abi::strip_hex_prefix(bytecode));
        data.push_str(
            abi::encode(constructor_args)
                .context(format_context!("while encoding {name} constructor arguments"))?
                .as_str(),
        );
        let data = format!("0x{data}");

        endpoint_logger(progress_bar, self.endpoint.as_ref())
            .message(format!("deploying {name}").as_str());

        let transaction_hash = self
            .send_transaction(from.as_ref(), None, data.as_str())
            .context(format_context!("while deploying {name}"))?;

        let receipt = self
            .wait_for_receipt(progress_bar, transaction_hash.as_ref())
            .context(format_context!("while waiting for {name} deployment"))?;

        let address = receipt["contractAddress"]
            .as_str()
            .ok_or(format_error!(
                "Deployment of {name} produced a receipt without a contract address"
            ))?
            .to_string();

        endpoint_logger(progress_bar, self.endpoint.as_ref())
            .info(format!("{name} deployed at {address}").as_str());

        Ok(address.into())
    }

    /// Sends a contract call as a transaction and waits for it to be mined.
    pub fn transact(
        &self,
        progress_bar: &mut printer::MultiProgressBar,
        to: &str,
        signature: &str,
        args: &[abi::Token],
    ) -> anyhow::Result<serde_json::Value> {
        let accounts = self
            .get_accounts()
            .context(format_context!("while transacting with {to}"))?;
        let from = accounts
            .first()
            .ok_or(format_error!("No unlocked accounts available on the chain"))?;

        let arguments = abi::encode(args)
            .context(format_context!("while encoding {signature} arguments"))?;
        let data = format!("0x{}{}", abi::selector(signature), arguments);

        endpoint_logger(progress_bar, self.endpoint.as_ref())
            .debug(format!("{to}: {signature}").as_str());

        let transaction_hash = self
            .send_transaction(from.as_ref(), Some(to), data.as_str())
            .context(format_context!("while calling {signature} on {to}"))?;

        self.wait_for_receipt(progress_bar, transaction_hash.as_ref())
            .context(format_context!("while waiting for {signature} on {to}"))
    }
}
