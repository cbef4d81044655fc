use ethers::types::Address;

const ADDRESS_HEX_LEN: usize = 40;

/// Reasons a contract address is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[allow(missing_docs)]
pub enum AddressError {
    #[error("the EVM address cannot be empty")]
    Empty,

    #[error("valid EVM address is required, got {0:?}")]
    Malformed(String),
}

/// Parse a hex encoded 20-byte address, the `0x` prefix is optional.
///
/// # Arguments
///
/// * `addr`: the address as passed by the user
pub fn validate_address(addr: &str) -> Result<Address, AddressError> {
    if addr.is_empty() {
        return Err(AddressError::Empty);
    }

    let digits = addr
        .strip_prefix("0x")
        .or_else(|| addr.strip_prefix("0X"))
        .unwrap_or(addr);

    if digits.len() != ADDRESS_HEX_LEN {
        return Err(AddressError::Malformed(addr.to_string()));
    }

    let bytes = hex::decode(digits).map_err(|_| AddressError::Malformed(addr.to_string()))?;

    Ok(Address::from_slice(&bytes))
}
