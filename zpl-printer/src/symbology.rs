//! Barcode symbology helpers
//!
//! Pure functions shared by the label compiler:
//! - GS1 mod-10 check digits (EAN-8, UPC-A, EAN-13, GTIN-14)
//! - Code 128 (subset B, optional GS1 FNC1), EAN-13 and UPC-A bar patterns
//! - CRC-16/ARC and the PTI voice-pick code derived from it

// ============================================================================
// Check digits
// ============================================================================

/// Compute the GS1 mod-10 check digit for a digit string.
///
/// Non-digit characters are ignored. Positions at an odd distance from the
/// right end (the digit next to the check digit is distance 1) weigh 3, the
/// others weigh 1. Returns `None` when the input has no digits.
pub fn check_digit(digits: &str) -> Option<char> {
    let nums: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    if nums.is_empty() {
        return None;
    }

    let len = nums.len();
    let sum: u32 = nums
        .iter()
        .enumerate()
        .map(|(i, d)| if (len - i) % 2 == 0 { *d } else { d * 3 })
        .sum();

    char::from_digit((10 - sum % 10) % 10, 10)
}

/// Append a check digit when the length says one is missing.
///
/// Lengths 8, 12, 13 and 14 are taken as complete codes and returned as
/// digits only. Lengths 7 (EAN-8) and 11 (UPC-A) get a computed check digit.
/// Anything else is returned untouched. This is a length heuristic, not a
/// symbology validation.
pub fn add_check_digit_if_needed(code: &str) -> String {
    if code.is_empty() {
        return String::new();
    }

    let digits: String = code.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        8 | 12 | 13 | 14 => digits,
        7 | 11 => match check_digit(&digits) {
            Some(cd) => format!("{}{}", digits, cd),
            None => digits,
        },
        _ => code.to_string(),
    }
}

// ============================================================================
// Code 128
// ============================================================================

const CODE128_START_B: usize = 104;
const CODE128_FNC1: usize = 102;
const CODE128_STOP: usize = 106;

/// Module patterns for Code 128 values 0..=106 (106 is the 13-module stop).
const CODE128_PATTERNS: [&str; 107] = [
    "11011001100", "11001101100", "11001100110", "10010011000", "10010001100",
    "10001001100", "10011001000", "10011000100", "10001100100", "11001001000",
    "11001000100", "11000100100", "10110011100", "10011011100", "10011001110",
    "10111001100", "10011101100", "10011100110", "11001110010", "11001011100",
    "11001001110", "11011100100", "11001110100", "11101101110", "11101001100",
    "11100101100", "11100100110", "11101100100", "11100110100", "11100110010",
    "11011011000", "11011000110", "11000110110", "10100011000", "10001011000",
    "10001000110", "10110001000", "10001101000", "10001100010", "11010001000",
    "11000101000", "11000100010", "10110111000", "10110001110", "10001101110",
    "10111011000", "10111000110", "10001110110", "11101110110", "11010001110",
    "11000101110", "11011101000", "11011100010", "11011101110", "11101011000",
    "11101000110", "11100010110", "11101101000", "11101100010", "11100011010",
    "11101111010", "11001000010", "11110001010", "10100110000", "10100001100",
    "10010110000", "10010000110", "10000101100", "10000100110", "10110010000",
    "10110000100", "10011010000", "10011000010", "10000110100", "10000110010",
    "11000010010", "11001010000", "11110111010", "11000010100", "10001111010",
    "10100111100", "10010111100", "10010011110", "10111100100", "10011110100",
    "10011110010", "11110100100", "11110010100", "11110010010", "11011011110",
    "11011110110", "11110110110", "10101111000", "10100011110", "10001011110",
    "10111101000", "10111100010", "11110101000", "11110100010", "10111011110",
    "10111101110", "11101011110", "11110101110", "11010000100", "11010010000",
    "11010011100", "1100011101011",
];

/// Code 128 symbol values (start, optional FNC1, data, checksum, stop).
///
/// Only printable ASCII (32..=126) is encoded; other bytes are dropped.
pub fn code128_values(payload: &str, gs1: bool) -> Vec<usize> {
    let mut values = vec![CODE128_START_B];
    if gs1 {
        values.push(CODE128_FNC1);
    }
    values.extend(
        payload
            .bytes()
            .filter(|b| (32..=126).contains(b))
            .map(|b| (b - 32) as usize),
    );

    let checksum = values
        .iter()
        .enumerate()
        .skip(1)
        .fold(values[0], |acc, (i, v)| acc + v * i);
    values.push(checksum % 103);
    values.push(CODE128_STOP);
    values
}

/// Encode a payload as a Code 128 module string (`1` = bar, `0` = space).
pub fn encode_code128(payload: &str, gs1: bool) -> String {
    code128_values(payload, gs1)
        .into_iter()
        .map(|v| CODE128_PATTERNS[v])
        .collect()
}

// ============================================================================
// EAN-13 / UPC-A
// ============================================================================

const EAN_L: [&str; 10] = [
    "0001101", "0011001", "0010011", "0111101", "0100011",
    "0110001", "0101111", "0111011", "0110111", "0001011",
];
const EAN_G: [&str; 10] = [
    "0100111", "0110011", "0011011", "0100001", "0011101",
    "0111001", "0000101", "0010001", "0001001", "0010111",
];
const EAN_R: [&str; 10] = [
    "1110010", "1100110", "1101100", "1000010", "1011100",
    "1001110", "1010000", "1000100", "1001000", "1110100",
];
const EAN_PARITY: [&str; 10] = [
    "LLLLLL", "LLGLGG", "LLGGLG", "LLGGGL", "LGLLGG",
    "LGGLLG", "LGGGLL", "LGLGLG", "LGLGGL", "LGGLGL",
];

/// Left-pad with zeros (or truncate) a digit-only view of `data` to `len`.
fn fit_digits(data: &str, len: usize) -> Vec<usize> {
    let digits: Vec<usize> = data
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| d as usize)
        .collect();
    let mut fitted = vec![0; len.saturating_sub(digits.len())];
    fitted.extend(digits);
    fitted.truncate(len);
    fitted
}

/// Encode 13 digits as an EAN-13 module string (95 modules).
///
/// Shorter input is left-padded with zeros, longer input truncated.
pub fn encode_ean13(data: &str) -> String {
    let digits = fit_digits(data, 13);
    let parity = EAN_PARITY[digits[0]].as_bytes();

    let mut encoding = String::with_capacity(95);
    encoding.push_str("101");
    for (i, d) in digits[1..7].iter().enumerate() {
        encoding.push_str(if parity[i] == b'L' { EAN_L[*d] } else { EAN_G[*d] });
    }
    encoding.push_str("01010");
    for d in &digits[7..13] {
        encoding.push_str(EAN_R[*d]);
    }
    encoding.push_str("101");
    encoding
}

/// Encode 12 digits as UPC-A (EAN-13 with a leading zero).
pub fn encode_upc_a(data: &str) -> String {
    let digits: String = fit_digits(data, 12)
        .into_iter()
        .map(|d| char::from(b'0' + d as u8))
        .collect();
    encode_ean13(&format!("0{}", digits))
}

// ============================================================================
// CRC-16 / voice pick
// ============================================================================

const CRC16_TABLE: [u16; 256] = build_crc16_table();

/// CRC-16/ARC lookup table (reflected polynomial 0xA001).
const fn build_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u16;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xA001 } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// CRC-16/ARC (init 0, reflected, no final xor) over the low byte of each
/// UTF-16 unit of `input`. For ASCII this is the plain byte CRC.
pub fn crc16(input: &str) -> u16 {
    input.encode_utf16().fold(0u16, |crc, unit| {
        let byte = unit & 0xFF;
        (crc >> 8) ^ CRC16_TABLE[((crc ^ byte) & 0xFF) as usize]
    })
}

/// PTI voice-pick code, formatted `XX-XX`.
///
/// CRC-16 of the upper-cased `gtin + lot + date_token`, rendered as a
/// zero-padded decimal whose last four digits are split 2+2.
pub fn voice_pick_code(gtin: &str, lot: &str, date_token: &str) -> String {
    let combined = format!("{}{}{}", gtin, lot, date_token).to_uppercase();
    let decimal = format!("{:04}", crc16(&combined));
    let code = &decimal[decimal.len() - 4..];
    format!("{}-{}", &code[..2], &code[2..])
}
