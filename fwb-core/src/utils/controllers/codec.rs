//! Byte layouts used by the motor board registers.
//!
//! Integer fields travel big-endian, the wheel diameter float travels
//! little-endian. Both orders are fixed by the board firmware.

/// Wheel diameter and other float registers: IEEE-754 single, little-endian.
pub fn encode_f32(value: f32) -> [u8; 4] {
    value.to_le_bytes()
}

pub fn decode_f32(buf: [u8; 4]) -> f32 {
    f32::from_le_bytes(buf)
}

/// Unsigned 16-bit config value (deadzone, phase count, pulses per line).
pub fn encode_u16(value: u16) -> [u8; 2] {
    [(value >> 8) as u8, value as u8]
}

pub fn encode_i16(value: i16) -> [u8; 2] {
    encode_u16(value as u16)
}

/// Signed 16-bit tick delta, sign-extended from bit 15.
pub fn decode_i16(buf: [u8; 2]) -> i16 {
    let raw = ((buf[0] as u16) << 8) | buf[1] as u16;
    raw as i16
}

/// Cumulative tick count assembled from its high and low 16-bit halves.
pub fn decode_i32_halves(
    high: [u8; 2],
    low: [u8; 2],
) -> i32 {
    let hi = ((high[0] as u32) << 8) | high[1] as u32;
    let lo = ((low[0] as u32) << 8) | low[1] as u32;
    ((hi << 16) | lo) as i32
}

/// Four signed PWM words packed into the 8-byte PWM register payload.
pub fn encode_pwm(words: [i16; 4]) -> [u8; 8] {
    let mut out = [0u8; 8];
    for (chunk, word) in out.chunks_exact_mut(2).zip(words) {
        chunk.copy_from_slice(&encode_i16(word));
    }
    out
}

pub fn decode_pwm(buf: [u8; 8]) -> [i16; 4] {
    let mut out = [0i16; 4];
    for (word, chunk) in out.iter_mut().zip(buf.chunks_exact(2)) {
        *word = decode_i16([chunk[0], chunk[1]]);
    }
    out
}
