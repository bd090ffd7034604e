// SPDX-License-Identifier: MIT
//
// Copyright (C) 2025 Open Information Security Foundation

//! Argument types shared by multiple keyword parsers.

use num_traits::Num;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Helper type for keyword arguments that accept a number or a variable
/// name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumberOrName<T> {
    #[serde(rename = "value")]
    Number(T),
    #[serde(rename = "varname")]
    Name(String),
}

impl<T: Default> Default for NumberOrName<T> {
    fn default() -> Self {
        Self::Number(T::default())
    }
}

impl<T: FromStr + Num> NumberOrName<T> {
    /// Parse a numeric argument, falling back to a variable name.
    pub fn parse(input: &str) -> Self {
        let token = input.trim();
        match token.parse::<T>() {
            Ok(value) => Self::Number(value),
            Err(_) => Self::Name(token.to_string()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endian {
    #[default]
    #[serde(rename = "big")]
    Big,
    #[serde(rename = "little")]
    Little,
}

impl FromStr for Endian {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "big" => Ok(Endian::Big),
            "little" => Ok(Endian::Little),
            _ => Err(format!("invalid endian: {}", s)),
        }
    }
}

/// Numeric base for keywords taking a string representation of a number.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Base {
    #[default]
    #[serde(rename = "dec")]
    Dec,
    #[serde(rename = "hex")]
    Hex,
    #[serde(rename = "oct")]
    Oct,
}

impl FromStr for Base {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dec" => Ok(Base::Dec),
            "hex" => Ok(Base::Hex),
            "oct" => Ok(Base::Oct),
            _ => Err(format!("invalid base: {}", s)),
        }
    }
}
