//! Minimal payloads used to probe models without spending real quota.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use switchboard_core::ProbePayload;

/// 1x1 PNG placeholder.
const MINIMAL_PNG: &[u8] = b"\x89PNG\r\n\x1a\n\
\x00\x00\x00\rIHDR\x00\x00\x00\x01\x00\x00\x00\x01\x08\x02\x00\x00\x00\x90wS\xde\
\x00\x00\x00\tpHYs\x00\x00\x0b\x13\x00\x00\x0b\x13\x01\x00\x9a\x9c\x18\x00\
\x00\x00\nIDATx\x9cc\xf8\x00\x00\x00\x01\x00\x01\x00\x00\x00\x00IEND\xaeB`\x82";

/// Sample rate of the silent probe clip.
const SAMPLE_RATE: u32 = 44_100;
/// Bytes per 16-bit mono sample.
const BYTES_PER_SAMPLE: u16 = 2;

/// Prompt used by text probes.
pub const TEXT_PROMPT: &str = "test";
/// Prompt used by audio probes.
pub const AUDIO_PROMPT: &str = "a";

/// Base64 of a 1x1 PNG.
pub fn png_base64() -> String {
    STANDARD.encode(MINIMAL_PNG)
}

/// Mono 16-bit PCM WAV of silence lasting `duration_ms`.
pub fn silent_wav(duration_ms: u32) -> Vec<u8> {
    let samples = u64::from(SAMPLE_RATE) * u64::from(duration_ms) / 1000;
    let data_len = u32::try_from(samples * u64::from(BYTES_PER_SAMPLE)).unwrap_or(u32::MAX);
    let byte_rate = SAMPLE_RATE * u32::from(BYTES_PER_SAMPLE);

    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16_u32.to_le_bytes());
    wav.extend_from_slice(&1_u16.to_le_bytes());
    wav.extend_from_slice(&1_u16.to_le_bytes());
    wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&BYTES_PER_SAMPLE.to_le_bytes());
    wav.extend_from_slice(&16_u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.resize(44 + data_len as usize, 0);
    wav
}

/// Base64 of one second of silence.
pub fn wav_base64() -> String {
    STANDARD.encode(silent_wav(1000))
}

/// Minimal text probe.
pub fn text_probe() -> ProbePayload {
    ProbePayload::text(TEXT_PROMPT)
}

/// Minimal image probe.
pub fn image_probe() -> ProbePayload {
    ProbePayload::Image {
        prompt: TEXT_PROMPT.to_owned(),
        png_base64: png_base64(),
    }
}

/// Minimal audio probe.
pub fn audio_probe() -> ProbePayload {
    ProbePayload::Audio {
        prompt: AUDIO_PROMPT.to_owned(),
        wav_base64: wav_base64(),
    }
}
