//! ENS name resolution against the locally deployed registry.

use crate::{abi, Provider};
use anyhow::Context;
use anyhow_source_location::format_context;
use std::sync::Arc;

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

pub fn is_zero_address(address: &str) -> bool {
    address.eq_ignore_ascii_case(ZERO_ADDRESS)
}

fn node_call(signature: &str, node: [u8; 32]) -> anyhow::Result<String> {
    Ok(format!(
        "0x{}{}",
        abi::selector(signature),
        abi::encode(&[abi::Token::Bytes32(node)])?
    ))
}

/// Resolves a name through the registry: `resolver(node)` on the registry,
/// then `addr(node)` on the resolver. Returns `None` when either hop is
/// unset.
pub fn resolve(
    provider: &Provider,
    registry: &str,
    name: &str,
) -> anyhow::Result<Option<Arc<str>>> {
    let node = abi::namehash(name);

    let resolver_word = provider
        .call(registry, node_call("resolver(bytes32)", node)?.as_str())
        .context(format_context!("while looking up the resolver for {name}"))?;
    let resolver = abi::address_from_word(resolver_word.as_ref())
        .context(format_context!("while parsing the resolver for {name}"))?;
    if is_zero_address(resolver.as_ref()) {
        return Ok(None);
    }

    let address_word = provider
        .call(resolver.as_ref(), node_call("addr(bytes32)", node)?.as_str())
        .context(format_context!("while resolving the address for {name}"))?;
    let address = abi::address_from_word(address_word.as_ref())
        .context(format_context!("while parsing the address for {name}"))?;
    if is_zero_address(address.as_ref()) {
        return Ok(None);
    }

    Ok(Some(address))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_zero_address() {
        assert!(is_zero_address(ZERO_ADDRESS));
        assert!(!is_zero_address("0x5b1869d9a4c187f2eaa108f3062412ecf0526b24"));
    }

    #[test]
    fn test_node_call_layout() {
        let data = node_call("resolver(bytes32)", [0u8; 32]).unwrap();
        // 0x + selector + one word
        assert_eq!(data.len(), 2 + 8 + 64);
        assert!(data.starts_with("0x"));
    }
}
