use super::*;

#[test]
fn fnv_hash_is_stable_across_splits() {
    let mut a = Fnv1a64::new_default();
    a.write_bytes(b"synthetic://bars");
    let mut b = Fnv1a64::new_default();
    b.write_bytes(b"synthetic://");
    b.write_bytes(b"bars");
    assert_eq!(a.finish(), b.finish());
}

#[test]
fn mul_div255_variants_align() {
    for x in [0u16, 1, 127, 255] {
        for y in [0u16, 1, 127, 255] {
            assert_eq!(u16::from(mul_div255_u8(x, y)), mul_div255_u16(x, y));
        }
    }
}
