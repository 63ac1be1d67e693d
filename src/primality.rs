//! Primality Module
//!
//! 任意精度整数に対する確率的素数判定（Miller-Rabin）を実装するモジュール。
//!
//! 判定は次の順で行います。
//!
//! 1. 100未満の素数による試し割り
//! 2. `n < 3_317_044_064_679_887_385_961_981` の場合、最初の13個の素数を基数とする
//!    Miller-Rabin（この範囲では決定的に正しい）
//! 3. それ以上の場合、`ceil(k / 2)` 回のランダム基数によるMiller-Rabin
//!    （1回あたりの誤判定確率は1/4以下なので、全体で `2^-k` 以下）

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::api::PRIME_CERTAINTY;

/// 100未満の素数
const SMALL_PRIMES: [u32; 25] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89, 97,
];

/// 決定的Miller-Rabinで使用する基数（最初の13個の素数）
const DETERMINISTIC_BASES: [u32; 13] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41];

/// `DETERMINISTIC_BASES` で決定的に判定できる上限（この値未満）
const DETERMINISTIC_LIMIT: u128 = 3_317_044_064_679_887_385_961_981;

/// 確率的素数判定器
///
/// 内部に乱数生成器を持つため、判定には `&mut self` が必要です。
/// シードを固定すると、同じ入力に対して常に同じ基数列を使用します。
#[derive(Debug, Clone)]
pub struct PrimalityTest {
    certainty: u32,
    rng: StdRng,
}

impl Default for PrimalityTest {
    fn default() -> Self {
        Self::new(PRIME_CERTAINTY)
    }
}

impl PrimalityTest {
    /// OSのエントロピーで初期化した判定器を生成する
    pub fn new(certainty: u32) -> Self {
        Self {
            certainty,
            rng: StdRng::from_os_rng(),
        }
    }

    /// シードを固定した判定器を生成する
    pub fn with_seed(certainty: u32, seed: u64) -> Self {
        Self {
            certainty,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// 確実性パラメータ `k`
    pub fn certainty(&self) -> u32 {
        self.certainty
    }

    /// ランダム基数で実行するMiller-Rabinのラウンド数
    pub fn rounds(&self) -> u32 {
        self.certainty.div_ceil(2).max(1)
    }

    /// `n` がおそらく素数かどうかを判定する
    ///
    /// 素数に対しては必ず `true` を返します。合成数に対して `true` を返す確率は
    /// `2^-certainty` 以下です。
    pub fn is_probable_prime(&mut self, n: &BigUint) -> bool {
        if let Some(small) = n.to_u32() {
            if small < 2 {
                return false;
            }
            if SMALL_PRIMES.contains(&small) {
                return true;
            }
        }

        for p in SMALL_PRIMES {
            if (n % p).is_zero() {
                return false;
            }
        }

        // 97^2 未満で試し割りを通過した数は素数
        if n < &BigUint::from(97u32 * 97) {
            return true;
        }

        let witness = MillerRabin::new(n);

        match n.to_u128() {
            Some(value) if value < DETERMINISTIC_LIMIT => DETERMINISTIC_BASES
                .iter()
                .all(|&base| witness.passes(&BigUint::from(base))),
            _ => {
                let rounds = self.rounds();
                (0..rounds).all(|_| {
                    let base = self.random_base(n);
                    witness.passes(&base)
                })
            }
        }
    }

    /// `[2, n - 2]` の範囲の乱数基数を生成する
    fn random_base(&mut self, n: &BigUint) -> BigUint {
        let span = n - 3u32;
        let byte_len = (n.bits() as usize).div_ceil(8) + 8;
        let mut bytes = vec![0u8; byte_len];
        self.rng.fill_bytes(&mut bytes);
        BigUint::from_bytes_le(&bytes) % span + 2u32
    }
}

/// 奇数 `n` に対するMiller-Rabinの前計算（`n - 1 = d * 2^s`）
struct MillerRabin<'a> {
    n: &'a BigUint,
    n_minus_one: BigUint,
    d: BigUint,
    s: u64,
}

impl<'a> MillerRabin<'a> {
    fn new(n: &'a BigUint) -> Self {
        let n_minus_one = n - 1u32;
        let s = n_minus_one.trailing_zeros().unwrap_or(0);
        let d = &n_minus_one >> s;
        Self {
            n,
            n_minus_one,
            d,
            s,
        }
    }

    /// 基数 `a` で `n` が強擬素数テストに合格するか
    fn passes(&self, a: &BigUint) -> bool {
        let a = a % self.n;
        if a.is_zero() || a.is_one() || a == self.n_minus_one {
            return true;
        }

        let mut x = a.modpow(&self.d, self.n);
        if x.is_one() || x == self.n_minus_one {
            return true;
        }

        for _ in 1..self.s {
            x = (&x * &x) % self.n;
            if x == self.n_minus_one {
                return true;
            }
            if x.is_one() {
                return false;
            }
        }

        false
    }
}
