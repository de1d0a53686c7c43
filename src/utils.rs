/// [Szudzik pairing function][szudzik-pairing], wrapping on overflow.
///
/// ```text
/// (a, b) -> if (a<b) then (b^2 + a) else (a^2 + a + b)
/// ```
///
/// Injective while both arguments fit in 32 bits, which covers every arena index.
///
/// [szudzik-pairing]: http://szudzik.com/ElegantPairing.pdf
pub fn pairing2(a: u64, b: u64) -> u64 {
    if a < b {
        b.wrapping_mul(b).wrapping_add(a)
    } else {
        a.wrapping_mul(a).wrapping_add(a).wrapping_add(b)
    }
}

/// Pairing function for three `u64` values.
pub fn pairing3(a: u64, b: u64, c: u64) -> u64 {
    pairing2(pairing2(a, b), c)
}

pub trait MyHash {
    /// Hash used to pick a cache slot. Need not be perfect: caches compare full keys.
    fn hash(&self) -> u64;
}

impl MyHash for (u32, u32) {
    fn hash(&self) -> u64 {
        pairing2(self.0 as u64, self.1 as u64)
    }
}

impl MyHash for (u32, u32, u32) {
    fn hash(&self) -> u64 {
        pairing3(self.0 as u64, self.1 as u64, self.2 as u64)
    }
}
