//! RC4 as the Standard security handler uses it.
//!
//! Revision 2 encrypts the padding string once under the file key. Revisions 3 and 4 run the
//! user-verifier digest through 20 passes, re-keying every pass with `key ^ pass`, so a schedule
//! is set up per pass and thrown away.

/// Keystream generator after key scheduling.
#[derive(Clone)]
pub struct Rc4 {
    state: [u8; 256],
    x: u8,
    y: u8,
}

impl Rc4 {
    /// Schedule `key`. File keys are 5 to 16 bytes; an empty key panics.
    pub fn new(key: &[u8]) -> Self {
        assert!(!key.is_empty(), "RC4 key must be non-empty");
        let mut state: [u8; 256] = std::array::from_fn(|n| n as u8);
        let mut y = 0u8;
        for (x, &k) in (0..state.len()).zip(key.iter().cycle()) {
            y = y.wrapping_add(state[x]).wrapping_add(k);
            state.swap(x, usize::from(y));
        }
        Self { state, x: 0, y: 0 }
    }

    fn next_byte(&mut self) -> u8 {
        self.x = self.x.wrapping_add(1);
        self.y = self.y.wrapping_add(self.state[usize::from(self.x)]);
        let (x, y) = (usize::from(self.x), usize::from(self.y));
        self.state.swap(x, y);
        self.state[usize::from(self.state[x].wrapping_add(self.state[y]))]
    }

    /// XOR the next `data.len()` keystream bytes into `data`.
    pub fn apply_keystream(&mut self, data: &mut [u8]) {
        for byte in data {
            *byte ^= self.next_byte();
        }
    }
}

/// Encrypt (or, equivalently, decrypt) `data` in place under a fresh `key` schedule.
pub fn rc4_in_place(key: &[u8], data: &mut [u8]) {
    Rc4::new(key).apply_keystream(data);
}

/// Encrypt (or decrypt) `data` under `key`, returning a new buffer.
pub fn rc4_transform(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    rc4_in_place(key, &mut out);
    out
}
