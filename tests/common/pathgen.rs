//! Reproducible random request paths.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Shape of the generated paths.
#[derive(Debug, Clone)]
pub struct PathGenOptions {
    /// Characters names are drawn from.
    pub name_chars: String,
    pub min_name_length: usize,
    pub max_name_length: usize,
    pub min_names: usize,
    pub max_names: usize,
    /// On average one in every N paths ends with the separator; 0 never.
    pub closing_slash_in_every: u32,
    pub separator: String,
}

impl Default for PathGenOptions {
    fn default() -> Self {
        Self {
            name_chars: ('a'..='z').collect(),
            min_name_length: 3,
            max_name_length: 18,
            min_names: 0,
            max_names: 9,
            closing_slash_in_every: 3,
            separator: "/".to_string(),
        }
    }
}

pub struct PathGenerator {
    rng: StdRng,
    chars: Vec<char>,
    options: PathGenOptions,
}

impl PathGenerator {
    pub fn new(seed: u64) -> Self {
        Self::with_options(seed, PathGenOptions::default())
    }

    pub fn with_options(seed: u64, options: PathGenOptions) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            chars: options.name_chars.chars().collect(),
            options,
        }
    }

    fn name(&mut self) -> String {
        let len = self
            .rng
            .gen_range(self.options.min_name_length..=self.options.max_name_length);
        (0..len)
            .map(|_| self.chars[self.rng.gen_range(0..self.chars.len())])
            .collect()
    }

    /// Next absolute path, e.g. `/qzk/abcde/` or `/`.
    pub fn next_path(&mut self) -> String {
        let count = self
            .rng
            .gen_range(self.options.min_names..=self.options.max_names);
        let names: Vec<String> = (0..count).map(|_| self.name()).collect();

        let sep = self.options.separator.clone();
        let mut path = format!("{}{}", sep, names.join(&sep));
        if !names.is_empty()
            && self.options.closing_slash_in_every > 0
            && self.rng.gen_range(0..self.options.closing_slash_in_every) == 0
        {
            path.push_str(&sep);
        }
        path
    }

    pub fn paths(&mut self, n: usize) -> Vec<String> {
        (0..n).map(|_| self.next_path()).collect()
    }
}

