//! Custom assertion macros for testing.

/// Assert that two floating-point values are approximately equal.
///
/// # Example
///
/// ```rust
/// use mkfirm_test_helpers::assert_approx_eq;
///
/// assert_approx_eq!(0.5_f64, 0.5001_f64, 0.001_f64);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $tolerance:expr $(,)?) => {
        let left = $left;
        let right = $right;
        let tolerance = $tolerance;
        let diff = (left - right).abs();
        if diff > tolerance {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}`,\n  tolerance: `{:?}`",
                left, right, diff, tolerance
            );
        }
    };
}

/// Assert that a slice is sorted ascending by a key function.
///
/// # Example
///
/// ```rust
/// use mkfirm_test_helpers::assert_sorted_by_key;
///
/// assert_sorted_by_key!(&[(1, 'a'), (1, 'b'), (3, 'c')], |p: &(i32, char)| p.0);
/// ```
#[macro_export]
macro_rules! assert_sorted_by_key {
    ($collection:expr, $key:expr $(,)?) => {
        let collection = $collection;
        let key = $key;
        let mut iter = collection.iter();
        if let Some(mut prev) = iter.next() {
            for (i, curr) in iter.enumerate() {
                if key(prev) > key(curr) {
                    panic!(
                        "assertion failed: collection is not sorted by key\n  first unsorted pair at index {}: {:?} > {:?}",
                        i, prev, curr
                    );
                }
                prev = curr;
            }
        }
    };
}
