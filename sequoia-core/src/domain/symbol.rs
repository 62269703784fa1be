//! Ticker symbol — 6-digit code plus exchange suffix.
//!
//! Only main-board codes can be represented: `60xxxx` on Shanghai and
//! `00xxxx` on Shenzhen. Science/innovation (`688`), growth (`30`) and
//! Beijing exchange (`4`/`8`) codes are rejected at construction, so every
//! `TickerSymbol` in the system already satisfies the board filter.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Exchange a main-board code trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Exchange {
    Shanghai,
    Shenzhen,
}

impl Exchange {
    /// Canonical suffix including the dot (`.SH` / `.SZ`).
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Shanghai => ".SH",
            Self::Shenzhen => ".SZ",
        }
    }

    /// Lowercase prefix used by Sina quote codes.
    pub fn sina_prefix(self) -> &'static str {
        match self {
            Self::Shanghai => "sh",
            Self::Shenzhen => "sz",
        }
    }

    /// Market id used in Eastmoney `secid` parameters.
    pub fn eastmoney_market(self) -> u8 {
        match self {
            Self::Shanghai => 1,
            Self::Shenzhen => 0,
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.to_ascii_uppercase().as_str() {
            "SH" => Some(Self::Shanghai),
            "SZ" => Some(Self::Shenzhen),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("code '{0}' is not numeric")]
    NotNumeric(String),

    #[error("code '{0}' has more than 6 digits")]
    TooLong(String),

    #[error("code '{0}' is not on the Shanghai or Shenzhen main board")]
    NotMainBoard(String),

    #[error("unknown exchange suffix in '{0}'")]
    UnknownSuffix(String),

    #[error("suffix of '{0}' contradicts its code")]
    SuffixMismatch(String),
}

/// Exchange-qualified stock identifier, e.g. `600519.SH`.
///
/// Ordering matches the display string: the code is compared first and it
/// already determines the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TickerSymbol {
    code: [u8; 6],
    exchange: Exchange,
}

impl TickerSymbol {
    /// Build a symbol from a bare numeric code, deriving the exchange.
    ///
    /// Codes shorter than 6 digits are zero-padded first (listings sometimes
    /// ship `1` for `000001`). Anything outside the `60`/`00` main boards is
    /// rejected.
    pub fn main_board(code: &str) -> Result<Self, SymbolError> {
        let code = code.trim();
        if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SymbolError::NotNumeric(code.to_string()));
        }
        if code.len() > 6 {
            return Err(SymbolError::TooLong(code.to_string()));
        }
        let padded = format!("{code:0>6}");
        let exchange = if padded.starts_with("60") {
            Exchange::Shanghai
        } else if padded.starts_with("00") {
            Exchange::Shenzhen
        } else {
            return Err(SymbolError::NotMainBoard(padded));
        };

        let mut digits = [0u8; 6];
        digits.copy_from_slice(padded.as_bytes());
        Ok(Self {
            code: digits,
            exchange,
        })
    }

    /// Parse either `600519.SH` or a bare `600519`.
    ///
    /// A supplied suffix must agree with the suffix derived from the code.
    pub fn parse(raw: &str) -> Result<Self, SymbolError> {
        let raw = raw.trim();
        match raw.split_once('.') {
            None => Self::main_board(raw),
            Some((code, suffix)) => {
                let claimed = Exchange::from_suffix(suffix)
                    .ok_or_else(|| SymbolError::UnknownSuffix(raw.to_string()))?;
                let symbol = Self::main_board(code)?;
                if symbol.exchange != claimed {
                    return Err(SymbolError::SuffixMismatch(raw.to_string()));
                }
                Ok(symbol)
            }
        }
    }

    /// Bare 6-digit code without suffix.
    pub fn code(&self) -> &str {
        // Constructed only from ASCII digits.
        std::str::from_utf8(&self.code).unwrap_or("000000")
    }

    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    pub fn suffix(&self) -> &'static str {
        self.exchange.suffix()
    }

    /// Sina quote form: `sz000001`.
    pub fn sina_code(&self) -> String {
        format!("{}{}", self.exchange.sina_prefix(), self.code())
    }

    /// Eastmoney secid form: `1.600519` / `0.000001`.
    pub fn eastmoney_secid(&self) -> String {
        format!("{}.{}", self.exchange.eastmoney_market(), self.code())
    }

    /// Tushare `ts_code` form, identical to the display form.
    pub fn ts_code(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TickerSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.code(), self.suffix())
    }
}

impl FromStr for TickerSymbol {
    type Err = SymbolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TickerSymbol {
    type Error = SymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TickerSymbol> for String {
    fn from(symbol: TickerSymbol) -> Self {
        symbol.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_shanghai_suffix() {
        let s = TickerSymbol::main_board("600519").unwrap();
        assert_eq!(s.to_string(), "600519.SH");
        assert_eq!(s.exchange(), Exchange::Shanghai);
    }

    #[test]
    fn derives_shenzhen_suffix_and_pads() {
        let s = TickerSymbol::main_board("1").unwrap();
        assert_eq!(s.to_string(), "000001.SZ");
    }

    #[test]
    fn rejects_other_boards() {
        for code in ["688981", "300750", "830799", "430047", "200011", "900901"] {
            assert!(
                matches!(TickerSymbol::main_board(code), Err(SymbolError::NotMainBoard(_))),
                "{code} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(TickerSymbol::main_board("").is_err());
        assert!(TickerSymbol::main_board("60a519").is_err());
        assert!(TickerSymbol::main_board("6005190").is_err());
    }

    #[test]
    fn parse_checks_suffix_consistency() {
        assert!(TickerSymbol::parse("600519.SH").is_ok());
        assert!(TickerSymbol::parse("000001.sz").is_ok());
        assert_eq!(
            TickerSymbol::parse("600519.SZ"),
            Err(SymbolError::SuffixMismatch("600519.SZ".into()))
        );
        assert!(matches!(
            TickerSymbol::parse("600519.HK"),
            Err(SymbolError::UnknownSuffix(_))
        ));
    }

    #[test]
    fn upstream_forms() {
        let sz = TickerSymbol::parse("000001.SZ").unwrap();
        assert_eq!(sz.sina_code(), "sz000001");
        assert_eq!(sz.eastmoney_secid(), "0.000001");
        assert_eq!(sz.ts_code(), "000001.SZ");

        let sh = TickerSymbol::parse("600519.SH").unwrap();
        assert_eq!(sh.sina_code(), "sh600519");
        assert_eq!(sh.eastmoney_secid(), "1.600519");
    }

    #[test]
    fn ordering_matches_display() {
        let mut symbols = vec![
            TickerSymbol::parse("600519.SH").unwrap(),
            TickerSymbol::parse("000002.SZ").unwrap(),
            TickerSymbol::parse("000001.SZ").unwrap(),
            TickerSymbol::parse("601318.SH").unwrap(),
        ];
        symbols.sort();
        let rendered: Vec<String> = symbols.iter().map(|s| s.to_string()).collect();
        let mut expected = rendered.clone();
        expected.sort();
        assert_eq!(rendered, expected);
        assert_eq!(rendered[0], "000001.SZ");
    }

    #[test]
    fn serde_uses_display_string() {
        let s = TickerSymbol::parse("600036.SH").unwrap();
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, "\"600036.SH\"");
        let back: TickerSymbol = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
        assert!(serde_json::from_str::<TickerSymbol>("\"300750.SZ\"").is_err());
    }
}
