//! APU unit tests

mod channel_tests;

use super::*;

/// Base address of a channel's register block
pub(crate) fn ch_base(ch: u16) -> u16 {
    ports::CHANNEL_BASE + ch * ports::CHANNEL_STRIDE
}

/// Program a channel: frequency, volume, duration, mode, then enable
pub(crate) fn program_channel(
    apu: &mut Apu,
    ch: u16,
    freq: u16,
    volume: u8,
    duration: u16,
    loop_mode: bool,
) {
    let base = ch_base(ch);
    apu.write_port(base + ports::FREQ_LO, (freq & 0xFF) as u8);
    apu.write_port(base + ports::FREQ_HI, (freq >> 8) as u8);
    apu.write_port(base + ports::VOLUME, volume);
    apu.write_port(base + ports::DURATION_LO, (duration & 0xFF) as u8);
    apu.write_port(base + ports::DURATION_HI, (duration >> 8) as u8);
    apu.write_port(base + ports::DURATION_MODE, loop_mode as u8);
    apu.write_port(base + ports::CONTROL, 0x01);
}
