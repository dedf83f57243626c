//! Motorola S-record formatting: `S3` data lines and the terminating `S7`.

/// Maximum data words per `S3` record.
pub const MAX_WORDS_PER_RECORD: usize = 10;

fn checksum_byte(length: u8, address: u32, data: &[u32]) -> u8 {
    let mut sum: u32 = length as u32;
    sum += (address >> 24) & 0xff;
    sum += (address >> 16) & 0xff;
    sum += (address >> 8) & 0xff;
    sum += address & 0xff;
    for word in data {
        sum += (word >> 24) & 0xff;
        sum += (word >> 16) & 0xff;
        sum += (word >> 8) & 0xff;
        sum += word & 0xff;
    }
    (!(sum as u8)) & 0xff
}

fn format_record(record_type: u8, address: u32, data: &[u32]) -> String {
    let length = 4 + 4 * data.len() as u8 + 1;
    let checksum = checksum_byte(length, address, data);

    let mut line = format!("S{}{:02X}{:08X}", record_type, length, address);
    for word in data {
        line.push_str(&format!("{:08X}", word));
    }
    line.push_str(&format!("{:02X}", checksum));
    line
}

/// Formats an `S3` data record. `data.len()` must be in `1..=10`.
pub fn s3(address: u32, data: &[u32]) -> String {
    assert!(!data.is_empty() && data.len() <= MAX_WORDS_PER_RECORD);
    format_record(3, address, data)
}

/// Formats the terminating `S7` record carrying the entry point address.
pub fn s7(entry_point: u32) -> String {
    format_record(7, entry_point, &[])
}

/// Splits a contiguous run of words starting at `base` into `S3` lines of at
/// most [`MAX_WORDS_PER_RECORD`] words each.
pub fn emit_region(base: u32, words: &[u32]) -> Vec<String> {
    words
        .chunks(MAX_WORDS_PER_RECORD)
        .enumerate()
        .map(|(i, chunk)| s3(base.wrapping_add((i * MAX_WORDS_PER_RECORD) as u32), chunk))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn s7_termination_record() {
        // S7, length 5, address 0x00000100, no data.
        // checksum = !(5 + 0x00 + 0x00 + 0x01 + 0x00) & 0xff = !6 & 0xff = 0xf9
        assert_eq!(s7(0x100), "S70500000100F9");
    }

    #[test]
    fn checksum_is_self_consistent() {
        let line = s3(0x1000, &[0xdead_beef, 0x0001_0203]);
        let cc = u8::from_str_radix(&line[line.len() - 2..], 16).unwrap();
        let length = u8::from_str_radix(&line[1..3], 16).unwrap();
        let address = u32::from_str_radix(&line[3..11], 16).unwrap();
        let word0 = u32::from_str_radix(&line[11..19], 16).unwrap();
        let word1 = u32::from_str_radix(&line[19..27], 16).unwrap();
        assert_eq!(checksum_byte(length, address, &[word0, word1]), cc);
    }

    #[test]
    fn emit_region_splits_at_ten_words() {
        let words: Vec<u32> = (0..15).collect();
        let lines = emit_region(0, &words);
        assert_eq!(lines.len(), 2);
    }
}

#[cfg(test)]
mod proptest_checks {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        // spec invariant: (sum_of_bytes(length, address, data) + checksum) & 0xFF == 0xFF
        #[test]
        fn checksum_satisfies_sum_invariant(
            address: u32,
            data in proptest::collection::vec(any::<u32>(), 0..=MAX_WORDS_PER_RECORD),
        ) {
            let length = 4 + 4 * data.len() as u8 + 1;
            let cc = checksum_byte(length, address, &data);

            let mut sum: u32 = length as u32;
            for byte in address.to_be_bytes() {
                sum += byte as u32;
            }
            for word in &data {
                for byte in word.to_be_bytes() {
                    sum += byte as u32;
                }
            }
            prop_assert_eq!((sum + cc as u32) & 0xff, 0xff);
        }

        #[test]
        fn emit_region_never_exceeds_ten_words_per_line(
            base: u32,
            words in proptest::collection::vec(any::<u32>(), 0..200),
        ) {
            let lines = emit_region(base, &words);
            for line in &lines {
                let length = u8::from_str_radix(&line[1..3], 16).unwrap();
                prop_assert!(length <= 4 + 4 * MAX_WORDS_PER_RECORD as u8 + 1);
            }
        }
    }
}
