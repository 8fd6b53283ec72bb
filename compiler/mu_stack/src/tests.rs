use super::*;

#[test]
fn test_nested_evaluation_depth() {
    fn depth(n: u64) -> u64 {
        ensure_sufficient_stack(|| if n == 0 { 0 } else { depth(n - 1) + 1 })
    }

    // Far deeper than an 8MB main-thread stack allows without growth
    assert_eq!(depth(200_000), 200_000);
}

#[test]
fn test_passes_result_through() {
    let result: Result<u32, String> = ensure_sufficient_stack(|| Ok(7));
    assert_eq!(result, Ok(7));
}
