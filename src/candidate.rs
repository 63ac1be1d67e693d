//! Candidate Module
//!
//! セルテキストから素数判定の候補となる整数を解析するモジュール。

use num_bigint::{BigInt, BigUint, Sign};
use std::fmt;

/// 候補値の解析に失敗した理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateError {
    /// 符号の後に数字がない、または空文字列
    Empty,
    /// 10進数字以外の文字を含む
    InvalidDigit,
}

impl fmt::Display for CandidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateError::Empty => write!(f, "no digits"),
            CandidateError::InvalidDigit => write!(f, "invalid digit found"),
        }
    }
}

impl std::error::Error for CandidateError {}

/// 解析済みの候補値の分類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// 正の整数（素数判定の対象）
    Positive(BigUint),
    /// 0または負の整数（判定対象外）
    NonPositive,
}

/// トリム済みテキストを10進の符号付き任意精度整数として解析する
///
/// 受け付ける形式は「任意の `+` / `-` 符号1つ」+「1桁以上のASCII数字」のみです。
/// 桁区切り、小数点、指数表記、空白は受け付けません。
///
/// # 使用例
///
/// ```rust
/// use primescan::{parse_candidate, Candidate};
///
/// assert!(matches!(parse_candidate("+17"), Ok(Candidate::Positive(_))));
/// assert_eq!(parse_candidate("-7"), Ok(Candidate::NonPositive));
/// assert!(parse_candidate("1,000").is_err());
/// ```
pub fn parse_candidate(text: &str) -> Result<Candidate, CandidateError> {
    let digits = text
        .strip_prefix('+')
        .or_else(|| text.strip_prefix('-'))
        .unwrap_or(text);

    if digits.is_empty() {
        return Err(CandidateError::Empty);
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CandidateError::InvalidDigit);
    }

    let magnitude =
        BigUint::parse_bytes(digits.as_bytes(), 10).ok_or(CandidateError::InvalidDigit)?;
    let sign = if text.starts_with('-') {
        Sign::Minus
    } else {
        Sign::Plus
    };
    let number = BigInt::from_biguint(sign, magnitude);

    match number.sign() {
        Sign::Plus => Ok(Candidate::Positive(number.magnitude().clone())),
        Sign::Minus | Sign::NoSign => Ok(Candidate::NonPositive),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positive(n: u64) -> Candidate {
        Candidate::Positive(BigUint::from(n))
    }

    #[test]
    fn test_parse_plain_digits() {
        assert_eq!(parse_candidate("7"), Ok(positive(7)));
        assert_eq!(parse_candidate("2147483647"), Ok(positive(2_147_483_647)));
        assert_eq!(parse_candidate("007"), Ok(positive(7)));
    }

    #[test]
    fn test_parse_signs() {
        assert_eq!(parse_candidate("+13"), Ok(positive(13)));
        assert_eq!(parse_candidate("-13"), Ok(Candidate::NonPositive));
        assert_eq!(parse_candidate("0"), Ok(Candidate::NonPositive));
        assert_eq!(parse_candidate("-0"), Ok(Candidate::NonPositive));
        assert_eq!(parse_candidate("+0"), Ok(Candidate::NonPositive));
    }

    #[test]
    fn test_parse_arbitrary_precision() {
        let text = "340282366920938463463374607431768211297";
        match parse_candidate(text) {
            Ok(Candidate::Positive(n)) => assert_eq!(n.to_string(), text),
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_malformed_text() {
        assert_eq!(parse_candidate(""), Err(CandidateError::Empty));
        assert_eq!(parse_candidate("+"), Err(CandidateError::Empty));
        assert_eq!(parse_candidate("-"), Err(CandidateError::Empty));
        assert_eq!(parse_candidate("+-5"), Err(CandidateError::InvalidDigit));
        assert_eq!(parse_candidate("1,000"), Err(CandidateError::InvalidDigit));
        assert_eq!(parse_candidate("1_000"), Err(CandidateError::InvalidDigit));
        assert_eq!(parse_candidate("7.0"), Err(CandidateError::InvalidDigit));
        assert_eq!(parse_candidate("1E+20"), Err(CandidateError::InvalidDigit));
        assert_eq!(parse_candidate("__STOP__"), Err(CandidateError::InvalidDigit));
        assert_eq!(parse_candidate(" 7"), Err(CandidateError::InvalidDigit));
        assert_eq!(parse_candidate("٧"), Err(CandidateError::InvalidDigit));
    }
}
