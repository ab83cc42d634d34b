//! Candidate counter arithmetic
//!
//! A password candidate is a vector of printable ASCII bytes read as a
//! big-endian numeral in base 95: byte `MIN_CANDIDATE_BYTE` is digit zero, the
//! last element is the least significant digit. Counting past the all-`MAX`
//! candidate of length `n` continues at the all-`MIN` candidate of length
//! `n + 1`, so the keyspace enumerates every length in turn:
//!
//! ```text
//! [] -> " " -> "!" -> ... -> "~" -> "  " -> " !" -> ... -> "~~" -> "   " -> ...
//! ```
//!
//! Workers step through their range with [`increment`]; the scheduler jumps
//! over whole ranges with [`advance`], which must land on exactly the same
//! candidate as `iterations` calls to [`increment`].

/// Smallest printable ASCII byte (space)
pub const MIN_CANDIDATE_BYTE: u8 = 32;
/// Largest printable ASCII byte (`~`)
pub const MAX_CANDIDATE_BYTE: u8 = 126;
/// Number of symbols in the candidate alphabet
pub const CANDIDATE_RADIX: u64 = (MAX_CANDIDATE_BYTE - MIN_CANDIDATE_BYTE) as u64 + 1;

/// Whether every byte lies in the candidate alphabet
pub fn is_valid_candidate(candidate: &[u8]) -> bool {
    candidate
        .iter()
        .all(|byte| (MIN_CANDIDATE_BYTE..=MAX_CANDIDATE_BYTE).contains(byte))
}

/// Step a candidate forward by one.
///
/// If every digit is already `MAX` the result is one element longer with
/// every digit reset to `MIN`.
pub fn increment(candidate: &[u8]) -> Vec<u8> {
    let mut next = candidate.to_vec();
    increment_in_place(&mut next);
    next
}

/// In-place form of [`increment`] used by hot worker loops.
pub fn increment_in_place(candidate: &mut Vec<u8>) {
    if candidate.iter().all(|&byte| byte >= MAX_CANDIDATE_BYTE) {
        let len = candidate.len() + 1;
        candidate.clear();
        candidate.resize(len, MIN_CANDIDATE_BYTE);
        return;
    }

    for digit in candidate.iter_mut().rev() {
        if *digit >= MAX_CANDIDATE_BYTE {
            *digit = MIN_CANDIDATE_BYTE;
        } else {
            *digit += 1;
            return;
        }
    }
}

/// Reference implementation of [`advance`]: `iterations` single steps.
///
/// O(iterations). Kept as the ground truth the positional version is tested
/// against.
pub fn advance_stepwise(candidate: &[u8], iterations: u64) -> Vec<u8> {
    let mut next = candidate.to_vec();
    for _ in 0..iterations {
        increment_in_place(&mut next);
    }
    next
}

/// Jump a candidate forward by `iterations` steps in O(digits).
///
/// Adds `iterations` positionally in base 95. Any carry out of the most
/// significant digit is spent growing the candidate: leaving length `n`
/// consumes one full cycle of `95^n` steps and restarts the count at the
/// all-`MIN` candidate of length `n + 1`, which is how [`increment`] behaves.
pub fn advance(candidate: &[u8], iterations: u64) -> Vec<u8> {
    let mut digits: Vec<u8> = candidate
        .iter()
        .map(|&byte| byte.saturating_sub(MIN_CANDIDATE_BYTE))
        .collect();

    let mut carry = iterations;
    for digit in digits.iter_mut().rev() {
        if carry == 0 {
            break;
        }
        let sum = *digit as u64 + carry % CANDIDATE_RADIX;
        carry /= CANDIDATE_RADIX;
        *digit = (sum % CANDIDATE_RADIX) as u8;
        carry += sum / CANDIDATE_RADIX;
    }

    // `carry` now counts whole cycles past the end of the current length.
    while carry > 0 {
        carry -= 1;
        digits.insert(0, (carry % CANDIDATE_RADIX) as u8);
        carry /= CANDIDATE_RADIX;
    }

    digits
        .into_iter()
        .map(|digit| digit + MIN_CANDIDATE_BYTE)
        .collect()
}

/// Literal candidate string that gets hashed
pub fn to_text(candidate: &[u8]) -> String {
    candidate.iter().map(|&byte| byte as char).collect()
}

/// Order candidates the way the counter enumerates them: shorter first, then
/// digit by digit.
pub fn keyspace_cmp(a: &[u8], b: &[u8]) -> core::cmp::Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
