//! Operator key and legacy (EIP-155) transfer signing.

use crate::error::{FaucetError, FaucetResult};
use k256::ecdsa::SigningKey;
use mission_control_common::Address;
use rlp::RlpStream;
use std::fmt;

/// Plain value transfer from the operator account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: u128,
    pub chain_id: u64,
}

impl TransferRequest {
    fn append_body(&self, stream: &mut RlpStream) {
        stream.append(&self.nonce);
        append_uint(stream, &self.gas_price.to_be_bytes());
        stream.append(&self.gas_limit);
        stream.append(&self.to.as_bytes().to_vec());
        append_uint(stream, &self.value.to_be_bytes());
        stream.append_empty_data();
    }

    /// Keccak hash of the EIP-155 signing payload.
    pub fn signing_hash(&self) -> [u8; 32] {
        let mut stream = RlpStream::new_list(9);
        self.append_body(&mut stream);
        stream.append(&self.chain_id);
        stream.append(&0u8);
        stream.append(&0u8);
        keccak_hash::keccak(stream.out()).0
    }
}

/// Signed transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone)]
pub struct SignedTransfer {
    pub raw: Vec<u8>,
    pub hash: [u8; 32],
}

impl SignedTransfer {
    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash))
    }
}

/// Private key of the account funding all grants.
pub struct OperatorKey {
    signing_key: SigningKey,
    address: Address,
}

impl OperatorKey {
    pub fn from_hex(private_key: &str) -> FaucetResult<Self> {
        let private_key = private_key.trim();
        let private_key_hex = private_key.strip_prefix("0x").unwrap_or(private_key);
        let bytes = hex::decode(private_key_hex)
            .map_err(|e| FaucetError::Signing(format!("Invalid private key: {}", e)))?;

        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|e| FaucetError::Signing(format!("Invalid signing key: {}", e)))?;

        // Address is the last 20 bytes of keccak(uncompressed pubkey without tag)
        let public_key = signing_key.verifying_key().to_encoded_point(false);
        let hash = keccak_hash::keccak(&public_key.as_bytes()[1..]);
        let address = Address::from_slice(&hash.0[12..]);

        Ok(Self {
            signing_key,
            address,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn sign_transfer(&self, request: &TransferRequest) -> FaucetResult<SignedTransfer> {
        let prehash = request.signing_hash();
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(&prehash)
            .map_err(|e| FaucetError::Signing(format!("Signing failed: {}", e)))?;

        let v = request
            .chain_id
            .checked_mul(2)
            .and_then(|v| v.checked_add(35 + u64::from(recovery_id.to_byte())))
            .ok_or_else(|| FaucetError::Signing(format!("Chain id too large: {}", request.chain_id)))?;

        let signature_bytes = signature.to_bytes();
        let (r, s) = signature_bytes.split_at(32);

        let mut stream = RlpStream::new_list(9);
        request.append_body(&mut stream);
        stream.append(&v);
        append_uint(&mut stream, r);
        append_uint(&mut stream, s);

        let raw = stream.out().to_vec();
        let hash = keccak_hash::keccak(&raw).0;
        Ok(SignedTransfer { raw, hash })
    }
}

impl fmt::Debug for OperatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorKey")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// RLP integers are big-endian without leading zeros.
fn append_uint(stream: &mut RlpStream, big_endian: &[u8]) {
    let start = big_endian
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(big_endian.len());
    stream.append(&big_endian[start..].to_vec());
}
