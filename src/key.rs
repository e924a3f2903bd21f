//! Cache key contract.
//!
//! Every key type used with [`crate::manager::CacheManager`] implements
//! `CacheKey` exactly once, so routing (`hashring`) and AOF encoding always
//! hash and serialize the same byte sequence regardless of call site.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::hash::Hash;

pub trait CacheKey: Eq + Hash + Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Stable textual form used for consistent-hash routing. Two keys that
    /// are `Eq` must render the same canonical form.
    fn canonical_form(&self) -> String;
}

impl CacheKey for String {
    fn canonical_form(&self) -> String {
        self.clone()
    }
}

macro_rules! impl_cache_key_int {
    ($($t:ty),*) => {
        $(
            impl CacheKey for $t {
                fn canonical_form(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

impl_cache_key_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_canonical_form_is_identity() {
        assert_eq!("hello".to_string().canonical_form(), "hello");
    }

    #[test]
    fn negative_integers_keep_sign() {
        assert_eq!((-42i64).canonical_form(), "-42");
    }

    #[test]
    fn equal_keys_render_equal_canonical_forms() {
        let a: u64 = 7;
        let b: u64 = 7;
        assert_eq!(a.canonical_form(), b.canonical_form());
    }
}
