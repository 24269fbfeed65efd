//! Random alphanumeric string generation, used for the advisory `runid`
//! configuration value.

use rand::distr::{Distribution, Uniform};
use rand::rng;

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Returns a random string of `len` alphanumeric characters.
pub fn rand_string(len: usize) -> String {
    let mut rng = rng();
    let dist = Uniform::new(0, ALPHABET.len()).expect("alphabet is non-empty");
    (0..len)
        .map(|_| ALPHABET[dist.sample(&mut rng)] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_length() {
        assert_eq!(rand_string(40).len(), 40);
        assert_eq!(rand_string(0).len(), 0);
    }

    #[test]
    fn only_alphanumeric() {
        let s = rand_string(200);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
