use aes::Aes256;
use fpe::ff1::{FlexibleNumeralString, FF1};
use hkdf::Hkdf;
use sha2::Sha256;

/// Highest value a real identifier may take, the maximum of a 4-byte
/// signed integer column. Anything a token reveals above this is a
/// transform artifact, never a genuine id.
pub const DOMAIN_CEILING: u32 = 2_147_483_647;

/// Width of every raw token, in decimal digits.
pub const TOKEN_DIGITS: usize = 10;

/// Keyed reversible transform between integer ids and 10-digit strings.
///
/// `Scatter` is a bijection over the full 10-digit space `[0, 9_999_999_999]`,
/// implemented as format-preserving encryption (FF1 with AES-256) at radix 10.
/// The AES key is derived from the spin with HKDF-SHA256, so the same spin
/// always yields the same mapping across process restarts, and distinct spins
/// yield unrelated mappings.
///
/// This is obfuscation, not secrecy: anyone holding the spin can reverse the
/// transform. The properties that matter here are determinism, bijectivity,
/// and fixed-width output.
///
/// # Examples
///
/// ```
/// use maskid_rs::Scatter;
///
/// let scatter = Scatter::new(141_819);
/// let token = scatter.hide(12345);
/// assert_eq!(token.len(), 10);
/// assert!(token.bytes().all(|b| b.is_ascii_digit()));
/// assert_eq!(scatter.reveal(&token), 12345);
/// ```
pub struct Scatter {
    ff1: FF1<Aes256>,
}

impl Scatter {
    /// Creates a new `Scatter` instance keyed by `spin`.
    ///
    /// Building the AES key schedule is the expensive part, so callers that
    /// transform many ids should hold on to the instance rather than calling
    /// the free [`hide`]/[`reveal`] functions repeatedly.
    pub fn new(spin: u128) -> Scatter {
        let hkdf = Hkdf::<Sha256>::new(None, &spin.to_le_bytes());
        let mut key = [0u8; 32];
        hkdf.expand(b"scatter/ff1", &mut key)
            .expect("Length 32 should be valid");
        Scatter {
            ff1: FF1::<Aes256>::new(&key, 10).expect("Radix 10 should be valid"),
        }
    }

    /// Encrypts `id` into a string of exactly 10 decimal digits.
    ///
    /// The output width is independent of the id's magnitude; small ids do
    /// not produce short tokens.
    pub fn hide(&self, id: u32) -> String {
        let digits = self
            .ff1
            .encrypt(&[], &FlexibleNumeralString::from(to_digits(u64::from(id))))
            .expect("Radix 10 should be valid");
        render_digits(&Vec::from(digits))
    }

    /// Decrypts a token back into the integer it was built from.
    ///
    /// This is total: non-digit characters are ignored, digits beyond the
    /// first 10 are dropped, and shorter inputs are left-padded with zeros.
    /// Any input therefore decodes deterministically to some integer in
    /// `[0, 9_999_999_999]`; whether that integer is a plausible id is the
    /// caller's concern (see the deobfuscation guard).
    pub fn reveal(&self, token: &str) -> u64 {
        let digits = self
            .ff1
            .decrypt(&[], &FlexibleNumeralString::from(parse_digits(token)))
            .expect("Radix 10 should be valid");
        from_digits(&Vec::from(digits))
    }
}

/// One-shot form of [`Scatter::hide`].
pub fn hide(id: u32, spin: u128) -> String {
    Scatter::new(spin).hide(id)
}

/// One-shot form of [`Scatter::reveal`].
pub fn reveal(token: &str, spin: u128) -> u64 {
    Scatter::new(spin).reveal(token)
}

// Zero-padded base-10 digits, most significant first.
fn to_digits(mut num: u64) -> Vec<u16> {
    let mut digits = vec![0u16; TOKEN_DIGITS];
    for slot in digits.iter_mut().rev() {
        *slot = (num % 10) as u16;
        num /= 10;
    }
    digits
}

fn from_digits(digits: &[u16]) -> u64 {
    digits.iter().fold(0u64, |acc, &d| acc * 10 + u64::from(d))
}

fn render_digits(digits: &[u16]) -> String {
    digits.iter().map(|&d| char::from(b'0' + d as u8)).collect()
}

// Keeps the first TOKEN_DIGITS digit characters and left-pads with zeros.
fn parse_digits(token: &str) -> Vec<u16> {
    let found: Vec<u16> = token
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(TOKEN_DIGITS)
        .map(|c| (c as u8 - b'0') as u16)
        .collect();
    let mut digits = vec![0u16; TOKEN_DIGITS - found.len()];
    digits.extend(found);
    digits
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::{distributions::Uniform, Rng};

    #[test]
    fn test_fixed_width() {
        let scatter = Scatter::new(141_819);
        for id in [0u32, 1, 2, 123, DOMAIN_CEILING, u32::MAX] {
            let token = scatter.hide(id);
            assert_eq!(token.len(), TOKEN_DIGITS, "Failed at id: {}", id);
            assert!(token.bytes().all(|b| b.is_ascii_digit()));
            assert_eq!(scatter.reveal(&token), u64::from(id));
        }
    }

    #[test]
    fn test_deterministic_across_instances() {
        let a = Scatter::new(141_819);
        let b = Scatter::new(141_819);
        for id in [0u32, 1, 123, DOMAIN_CEILING] {
            assert_eq!(a.hide(id), b.hide(id));
        }
        assert_eq!(hide(123, 141_819), a.hide(123));
        assert_eq!(reveal(&a.hide(123), 141_819), 123);
    }

    #[test]
    fn test_spin_isolation() {
        let a = Scatter::new(1);
        let b = Scatter::new(2);
        let collisions = (0u32..1_000).filter(|&id| a.hide(id) == b.hide(id)).count();
        assert!(
            collisions <= 50,
            "spins 1 and 2 collided on {} of 1000 ids",
            collisions
        );
    }

    #[test]
    fn test_reveal_normalizes_input() {
        let scatter = Scatter::new(7);
        // Short inputs are left-padded with zeros.
        assert_eq!(scatter.reveal("42"), scatter.reveal("0000000042"));
        // Non-digit characters are ignored.
        assert_eq!(scatter.reveal("x4y2z"), scatter.reveal("42"));
        // Digits beyond the first ten are dropped.
        assert_eq!(
            scatter.reveal("12345678901234"),
            scatter.reveal("1234567890")
        );
    }

    #[test]
    fn test_random_roundtrips() {
        let scatter = Scatter::new(826_404);
        let mut rng = rand::thread_rng();
        let range = Uniform::new_inclusive(0u32, DOMAIN_CEILING);

        for _ in 0..10_000 {
            let id = rng.sample(range);
            let token = scatter.hide(id);
            let revealed = scatter.reveal(&token);

            assert_eq!(revealed, u64::from(id), "Failed at id: {}", id);
        }
    }

    proptest! {
        #[test]
        fn prop_round_trips(id in 0u32..=DOMAIN_CEILING, spin in any::<u64>()) {
            let scatter = Scatter::new(u128::from(spin));
            prop_assert_eq!(scatter.reveal(&scatter.hide(id)), u64::from(id));
        }

        #[test]
        fn prop_reveal_is_total(input in ".*") {
            let scatter = Scatter::new(1);
            prop_assert!(scatter.reveal(&input) < 10_000_000_000);
        }
    }
}
