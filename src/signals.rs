//! Directional signals drawn independently of price.
//!
//! A [`CoinToss`] flips a fair coin per bar. It is generic over its random
//! source so a seeded generator replays the exact same sequence.

use rand::{Rng, SeedableRng, rngs::StdRng};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::Bar;

/// Directional opinion for one bar. There is no "hold".
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Go or stay long.
    Long,
    /// Go or stay short.
    Short,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// Produces one signal per tradable bar, in bar order.
pub trait SignalGenerator {
    /// Returns the signal for `bar`.
    fn signal(&mut self, bar: &Bar) -> Signal;
}

impl<F> SignalGenerator for F
where
    F: FnMut(&Bar) -> Signal,
{
    fn signal(&mut self, bar: &Bar) -> Signal {
        self(bar)
    }
}

/// Fair coin flip per bar.
#[derive(Debug, Clone)]
pub struct CoinToss<R = StdRng> {
    rng: R,
}

impl CoinToss<StdRng> {
    /// A generator that replays the same sequence for the same `seed`.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    /// A generator seeded from the operating system.
    pub fn from_os_rng() -> Self {
        Self::new(StdRng::from_os_rng())
    }

    /// Seeded when `seed` is set, OS-seeded otherwise.
    pub fn from_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_os_rng, Self::seeded)
    }
}

impl<R: Rng> CoinToss<R> {
    /// Wraps any random source.
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> SignalGenerator for CoinToss<R> {
    fn signal(&mut self, _bar: &Bar) -> Signal {
        if self.rng.random_bool(0.5) {
            Signal::Long
        } else {
            Signal::Short
        }
    }
}

/// Number of long and short signals drawn.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignalCounts {
    /// Long signals.
    pub long: usize,
    /// Short signals.
    pub short: usize,
}

impl SignalCounts {
    /// Total number of signals.
    pub fn total(&self) -> usize {
        self.long + self.short
    }
}

impl<'a> FromIterator<&'a Signal> for SignalCounts {
    fn from_iter<I: IntoIterator<Item = &'a Signal>>(iter: I) -> Self {
        iter.into_iter().fold(Self::default(), |mut counts, signal| {
            match signal {
                Signal::Long => counts.long += 1,
                Signal::Short => counts.short += 1,
            }
            counts
        })
    }
}

#[cfg(test)]
fn flips<G: SignalGenerator>(generator: &mut G, n: usize) -> Vec<Signal> {
    let bar = Bar::from((chrono::DateTime::<chrono::Utc>::default(), 1.0, 2.0, 0.5, 1.5));
    (0..n).map(|_| generator.signal(&bar)).collect()
}

#[cfg(test)]
#[test]
fn seeded_coin_toss_replays() {
    let a = flips(&mut CoinToss::seeded(42), 200);
    let b = flips(&mut CoinToss::seeded(42), 200);
    assert_eq!(a, b);

    let c = flips(&mut CoinToss::seeded(43), 200);
    assert_ne!(a, c);
}

#[cfg(test)]
#[test]
fn coin_toss_draws_both_sides() {
    let counts = flips(&mut CoinToss::seeded(7), 1_000).iter().collect::<SignalCounts>();
    assert_eq!(counts.total(), 1_000);
    // a fair coin lands far inside these bounds over 1000 flips
    assert!(counts.long > 400 && counts.short > 400);
}

#[cfg(test)]
#[test]
fn closures_are_generators() {
    let mut always_short = |_: &Bar| Signal::Short;
    let counts = flips(&mut always_short, 3).iter().collect::<SignalCounts>();
    assert_eq!(counts, SignalCounts { long: 0, short: 3 });
}
