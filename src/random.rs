use rand::Rng;

/// Source of the coin flips and index picks used by reminders.
pub trait Randomness: Send + Sync {
    fn coin_flip(&self) -> bool;

    /// Uniform index in `0..upper`. Returns 0 when `upper` is 0.
    fn below(&self, upper: usize) -> usize;
}

pub struct ThreadRandom;

impl Randomness for ThreadRandom {
    fn coin_flip(&self) -> bool {
        rand::thread_rng().gen_bool(0.5)
    }

    fn below(&self, upper: usize) -> usize {
        if upper == 0 {
            return 0;
        }

        rand::thread_rng().gen_range(0..upper)
    }
}

#[cfg(test)]
pub mod fixed {
    use super::Randomness;

    /// Always lands on the same side and always picks the same index.
    pub struct Fixed {
        pub heads: bool,
        pub index: usize,
    }

    impl Randomness for Fixed {
        fn coin_flip(&self) -> bool {
            self.heads
        }

        fn below(&self, upper: usize) -> usize {
            self.index.min(upper.saturating_sub(1))
        }
    }
}
