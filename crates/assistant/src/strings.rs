//! String utility functions exposed through the `string-functions` resource.
use rand::Rng;

const ALPHANUMERIC: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Longest string the `random` function will produce.
pub const MAX_RANDOM_LENGTH: usize = 4096;

/// Returns a random string of lowercase letters and digits.
pub fn random_string(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(ALPHANUMERIC[rng.gen_range(0..ALPHANUMERIC.len())]))
        .collect()
}

/// A string function selected by the resource's `Function` property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringFunction {
    Random { length: usize },
    Lower { input: String },
}

impl StringFunction {
    pub fn apply(&self) -> String {
        match self {
            StringFunction::Random { length } => random_string(*length),
            StringFunction::Lower { input } => input.to_lowercase(),
        }
    }
}
