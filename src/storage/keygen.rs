//! Random short key generation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::{OsRng, SmallRng};
use rand::{Rng, SeedableRng, TryRngCore};
use tracing::warn;

use super::models::{SHORT_KEY_LEN, ShortKey};
use crate::errors::{Result, ShortenerError};

/// 默认字母表：大小写英文字母
pub const DEFAULT_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// 弱随机源的种子扰动计数器
static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct KeyGenerator {
    alphabet: Vec<u8>,
}

impl Default for KeyGenerator {
    fn default() -> Self {
        KeyGenerator {
            alphabet: DEFAULT_ALPHABET.as_bytes().to_vec(),
        }
    }
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用自定义字母表（必须为非空、无重复字符的 ASCII 字符串）
    pub fn with_alphabet(alphabet: &str) -> Result<Self> {
        if alphabet.is_empty() || !alphabet.is_ascii() {
            return Err(ShortenerError::validation(
                "字母表必须是非空的 ASCII 字符串".to_string(),
            ));
        }
        let mut symbols = alphabet.as_bytes().to_vec();
        symbols.sort_unstable();
        symbols.dedup();
        if symbols.len() != alphabet.len() {
            return Err(ShortenerError::validation(format!(
                "字母表包含重复字符: {}",
                alphabet
            )));
        }
        Ok(KeyGenerator {
            alphabet: alphabet.as_bytes().to_vec(),
        })
    }

    pub fn alphabet(&self) -> &[u8] {
        &self.alphabet
    }

    /// Produces a key of [`SHORT_KEY_LEN`] symbols drawn uniformly from the
    /// alphabet. Uses the OS CSPRNG and falls back to a clock-seeded PRNG if
    /// the OS source fails, so this never errors.
    pub fn generate(&self) -> ShortKey {
        let mut buf = [0u8; SHORT_KEY_LEN];
        match self.fill_secure(&mut buf) {
            Ok(()) => {}
            Err(e) => {
                warn!("OS random source failed, falling back to weak PRNG: {}", e);
                self.fill_weak(&mut buf);
            }
        }
        ShortKey::from_bytes(buf)
    }

    fn fill_secure(
        &self,
        buf: &mut [u8; SHORT_KEY_LEN],
    ) -> std::result::Result<(), <OsRng as TryRngCore>::Error> {
        let n = self.alphabet.len() as u32;
        // 拒绝采样，避免取模偏差
        let zone = u32::MAX - (u32::MAX % n);
        let mut rng = OsRng;
        for slot in buf.iter_mut() {
            let idx = loop {
                let v = rng.try_next_u32()?;
                if v < zone {
                    break v % n;
                }
            };
            *slot = self.alphabet[idx as usize];
        }
        Ok(())
    }

    fn fill_weak(&self, buf: &mut [u8; SHORT_KEY_LEN]) {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let seed = nanos ^ FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed).rotate_left(32);
        let mut rng = SmallRng::seed_from_u64(seed);
        for slot in buf.iter_mut() {
            *slot = self.alphabet[rng.random_range(0..self.alphabet.len())];
        }
    }
}
