//! The slice of the Solidity ABI the pool contract needs: static words,
//! `bytes`, and arrays of unsigned integers.

use ethereum_types::{Address, U256};
use sha3::{Digest, Keccak256};

use crate::claims::merkle::u256_bytes;
use crate::error::{PoolError, Result};

const WORD: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(U256),
    Bytes(Vec<u8>),
    /// Any `uintN[]`; every element takes a full word.
    UintArray(Vec<U256>),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        matches!(self, Token::Bytes(_) | Token::UintArray(_))
    }
}

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

pub fn encode_call(signature: &str, tokens: &[Token]) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend(encode(tokens));
    data
}

pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let mut head = Vec::with_capacity(tokens.len() * WORD);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            let offset = tokens.len() * WORD + tail.len();
            head.extend_from_slice(&u256_bytes(U256::from(offset)));
            encode_tail(token, &mut tail);
        } else {
            head.extend_from_slice(&static_word(token));
        }
    }

    head.extend(tail);
    head
}

fn static_word(token: &Token) -> [u8; 32] {
    match token {
        Token::Address(address) => {
            let mut word = [0u8; 32];
            word[12..].copy_from_slice(address.as_bytes());
            word
        }
        Token::Uint(value) => u256_bytes(*value),
        Token::Bytes(_) | Token::UintArray(_) => [0u8; 32],
    }
}

fn encode_tail(token: &Token, out: &mut Vec<u8>) {
    match token {
        Token::Bytes(bytes) => {
            out.extend_from_slice(&u256_bytes(U256::from(bytes.len())));
            out.extend_from_slice(bytes);
            let padding = (WORD - bytes.len() % WORD) % WORD;
            out.resize(out.len() + padding, 0);
        }
        Token::UintArray(values) => {
            out.extend_from_slice(&u256_bytes(U256::from(values.len())));
            for value in values {
                out.extend_from_slice(&u256_bytes(*value));
            }
        }
        Token::Address(_) | Token::Uint(_) => {}
    }
}

fn word_at(data: &[u8], offset: usize) -> Result<U256> {
    data.get(offset..offset + WORD)
        .map(U256::from_big_endian)
        .ok_or_else(|| PoolError::Abi(format!("output too short for word at {}", offset)))
}

fn usize_at(data: &[u8], offset: usize) -> Result<usize> {
    let value = word_at(data, offset)?;
    if value > U256::from(data.len()) {
        return Err(PoolError::Abi(format!("length or offset {} out of bounds", value)));
    }
    Ok(value.as_usize())
}

pub fn decode_uint(data: &[u8]) -> Result<U256> {
    word_at(data, 0)
}

pub fn decode_bool(data: &[u8]) -> Result<bool> {
    Ok(!word_at(data, 0)?.is_zero())
}

pub fn decode_string(data: &[u8]) -> Result<String> {
    let offset = usize_at(data, 0)?;
    let len = usize_at(data, offset)?;
    let start = offset + WORD;
    let bytes = data
        .get(start..start + len)
        .ok_or_else(|| PoolError::Abi("string runs past end of output".to_string()))?;
    String::from_utf8(bytes.to_vec()).map_err(|e| PoolError::Abi(e.to_string()))
}
