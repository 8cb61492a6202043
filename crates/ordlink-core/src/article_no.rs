//! Sort keys for article numbers with dash sub-numbering.
//!
//! Articles inserted between existing ones get dash suffixes: "5-2" reads
//! "the second article inserted after article 5", and a later insertion can
//! nest again ("5-2-1"). Plain string ordering puts "12-10" before "12-2";
//! these keys zero-pad each numeric segment so lexicographic order recovers
//! document order.

/// Normalise an article number into a lexicographically sortable key.
///
/// "5" becomes "005.000.000", "5-2" becomes "005.002.000", "12-10" becomes
/// "012.010.000". Non-numeric segments sort as zero; junk input never
/// panics.
pub fn sort_key(number: &str) -> String {
    let mut segments = [0u32; 3];
    for (slot, part) in segments.iter_mut().zip(number.trim().split('-')) {
        *slot = leading_number(part);
    }
    format!("{:03}.{:03}.{:03}", segments[0], segments[1], segments[2])
}

fn leading_number(part: &str) -> u32 {
    let digits: String = part
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}
