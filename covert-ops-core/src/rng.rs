//! Deterministic random streams and roll helpers shared by every resolver.
use hmac::{Hmac, Mac};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

/// Deterministic bundle of RNG streams segregated by campaign domain.
///
/// Every stream is derived from the campaign seed, so replaying the same
/// sequence of days with the same seed reproduces every outcome.
#[derive(Debug, Clone)]
pub struct RngBundle {
    operations: CountingRng<ChaCha20Rng>,
    scripts: CountingRng<ChaCha20Rng>,
}

impl RngBundle {
    /// Construct the bundle from a user-visible seed.
    #[must_use]
    pub fn from_user_seed(seed: u64) -> Self {
        Self {
            operations: CountingRng::new(derive_stream_seed(seed, b"operations")),
            scripts: CountingRng::new(derive_stream_seed(seed, b"scripts")),
        }
    }

    /// Rebuild the bundle for `seed` and fast-forward each stream to `cursor`.
    #[must_use]
    pub fn resume(seed: u64, cursor: RngCursor) -> Self {
        let mut bundle = Self::from_user_seed(seed);
        bundle.operations.seek(cursor.operations);
        bundle.scripts.seek(cursor.scripts);
        bundle
    }

    /// Current position of every stream, suitable for a save file.
    #[must_use]
    pub fn cursor(&self) -> RngCursor {
        RngCursor {
            operations: self.operations.position(),
            scripts: self.scripts.position(),
        }
    }

    /// Stream used by operation clocks, outcome rolls, placement and casualties.
    pub fn operations(&mut self) -> &mut CountingRng<ChaCha20Rng> {
        &mut self.operations
    }

    /// Stream used by the event script scheduler.
    pub fn scripts(&mut self) -> &mut CountingRng<ChaCha20Rng> {
        &mut self.scripts
    }
}

/// Saved position of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamCursor {
    /// ChaCha block word offset.
    pub word_pos: u64,
    pub draws: u64,
}

/// Saved positions of every stream in an [`RngBundle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RngCursor {
    pub operations: StreamCursor,
    pub scripts: StreamCursor,
}

/// Counting wrapper for RNG streams providing instrumentation.
#[derive(Debug, Clone)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl CountingRng<ChaCha20Rng> {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            draws: 0,
        }
    }

    fn position(&self) -> StreamCursor {
        StreamCursor {
            word_pos: u64::try_from(self.rng.get_word_pos()).unwrap_or(u64::MAX),
            draws: self.draws,
        }
    }

    fn seek(&mut self, cursor: StreamCursor) {
        self.rng.set_word_pos(u128::from(cursor.word_pos));
        self.draws = cursor.draws;
    }
}

impl<R: RngCore> CountingRng<R> {
    /// Number of draw calls performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }
}

impl<R: RngCore> RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.draws = self.draws.saturating_add(1);
        self.rng.try_fill_bytes(dest)
    }
}

fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()) else {
        return user_seed;
    };
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

/// Integer and percent rolls in the shape the campaign rules are written in.
pub trait RollExt: Rng {
    /// Uniform integer in `[min, max]`; reversed bounds are swapped.
    fn roll_range(&mut self, min: i32, max: i32) -> i32 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        self.gen_range(lo..=hi)
    }

    /// True with `chance` percent probability (`roll_range(0, 99) < chance`).
    fn roll_percent(&mut self, chance: i32) -> bool {
        self.roll_range(0, 99) < chance
    }

    /// Uniform index into a non-empty collection of `len` elements.
    fn roll_index(&mut self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.gen_range(0..len))
    }
}

impl<R: Rng + ?Sized> RollExt for R {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rng_bundle_uses_domain_hmac() {
        let seed = 0xFEED_CAFE_u64;
        let mut bundle = RngBundle::from_user_seed(seed);

        let mut expected = ChaCha20Rng::seed_from_u64(derive_stream_seed(seed, b"operations"));
        assert_eq!(bundle.operations().next_u32(), expected.next_u32());
        assert_eq!(bundle.operations().draws(), 1);
        assert_eq!(bundle.scripts().draws(), 0);

        assert_ne!(
            derive_stream_seed(seed, b"operations"),
            derive_stream_seed(seed, b"scripts"),
            "domain tags must derive distinct seeds"
        );
    }

    #[test]
    fn resumed_bundle_continues_each_stream() {
        let mut live = RngBundle::from_user_seed(42);
        for _ in 0..17 {
            live.operations().next_u32();
        }
        live.operations().next_u64();
        live.scripts().next_u32();
        let cursor = live.cursor();
        assert_eq!(cursor.operations.draws, 18);

        let mut resumed = RngBundle::resume(42, cursor);
        assert_eq!(resumed.cursor(), cursor);
        assert_eq!(resumed.operations().next_u64(), live.operations().next_u64());
        assert_eq!(resumed.scripts().next_u32(), live.scripts().next_u32());
        assert_eq!(resumed.operations().draws(), 19);
        assert_eq!(
            RngBundle::resume(42, RngCursor::default()).cursor(),
            RngBundle::from_user_seed(42).cursor()
        );
    }

    #[test]
    fn roll_range_is_inclusive_and_tolerates_reversed_bounds() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let mut seen_min = false;
        let mut seen_max = false;
        for _ in 0..500 {
            let value = rng.roll_range(3, 1);
            assert!((1..=3).contains(&value));
            seen_min |= value == 1;
            seen_max |= value == 3;
        }
        assert!(seen_min && seen_max);
        assert_eq!(rng.roll_range(5, 5), 5);
    }

    #[test]
    fn roll_percent_respects_bounds() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        assert!((0..100).all(|_| !rng.roll_percent(0)));
        assert!((0..100).all(|_| rng.roll_percent(100)));
        assert_eq!(rng.roll_index(0), None);
        assert!(rng.roll_index(3).is_some_and(|idx| idx < 3));
    }
}
