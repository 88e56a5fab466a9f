// DNA alphabet
// Definite symbols are A/C/G/T; every other input byte collapses to the sentinel N.

/// The four definite bases, in 2-bit code order.
pub const LITERAL: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Sentinel for an indefinite base.
pub const N: u8 = b'N';

/// True for the four definite bases (uppercase only; `normalize` upcases first).
#[inline]
pub const fn is_definite(b: u8) -> bool {
    matches!(b, b'A' | b'C' | b'G' | b'T')
}

/// Map an arbitrary input byte to the working alphabet {A, C, G, T, N}.
#[inline]
pub fn normalize(b: u8) -> u8 {
    let up = b.to_ascii_uppercase();
    if is_definite(up) {
        up
    } else {
        N
    }
}

/// 2-bit code of a base (A=0, C=1, G=2, T=3). `N` maps to 0; callers must
/// gate on `is_definite` wherever the code is meaningful.
#[inline]
pub const fn code_of(b: u8) -> u64 {
    match b {
        b'C' => 1,
        b'G' => 2,
        b'T' => 3,
        _ => 0,
    }
}

/// Base for a 2-bit code.
#[inline]
pub const fn base_of(code: u64) -> u8 {
    LITERAL[(code & 3) as usize]
}

/// Complement of a symbol; `N` complements to itself.
#[inline]
pub const fn complement(b: u8) -> u8 {
    match b {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' => b'A',
        other => other,
    }
}

/// Complement of a 2-bit code.
#[inline]
pub const fn complement_code(code: u64) -> u64 {
    code ^ 3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definite() {
        assert!(is_definite(b'A'));
        assert!(is_definite(b'T'));
        assert!(!is_definite(b'N'));
        assert!(!is_definite(b'a'));
        assert!(!is_definite(b'>'));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(b'a'), b'A');
        assert_eq!(normalize(b'T'), b'T');
        assert_eq!(normalize(b'n'), N);
        assert_eq!(normalize(b'R'), N);
        assert_eq!(normalize(b'7'), N);
    }

    #[test]
    fn test_codes_roundtrip() {
        for (i, &b) in LITERAL.iter().enumerate() {
            assert_eq!(code_of(b), i as u64);
            assert_eq!(base_of(i as u64), b);
        }
    }

    #[test]
    fn test_complement() {
        assert_eq!(complement(b'A'), b'T');
        assert_eq!(complement(b'G'), b'C');
        assert_eq!(complement(N), N);
        for c in 0..4u64 {
            assert_eq!(code_of(complement(base_of(c))), complement_code(c));
        }
    }
}
