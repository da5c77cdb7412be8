//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;
use std::sync::Mutex;

use crate::error::SynthesisError;
use crate::tts::SpeechSynthesizer;
use crate::wire::{TtsBatchRequest, TtsRequest};

/// Sample rate of fabricated clips; 500 ms of silence is 5 frames.
pub const TEST_RATE: u32 = 10;

pub fn test_spec() -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate: TEST_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// A mono 16-bit WAV file holding `samples`.
pub fn wav_bytes(samples: &[i16]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, test_spec()).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

#[derive(Debug, Clone)]
pub enum Call {
    Single(TtsRequest),
    Batch(TtsBatchRequest),
}

/// Records every request. The n-th successful single request returns a
/// clip holding the one sample `n`; batch clip `i` holds sample `i + 1`.
#[derive(Default)]
pub struct FakeSynthesizer {
    calls: Mutex<Vec<Call>>,
    fail_on: Option<String>,
    batch_clip_limit: Option<usize>,
}

impl FakeSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any request containing this utterance.
    pub fn failing_on(mut self, text: &str) -> Self {
        self.fail_on = Some(text.to_string());
        self
    }

    /// Return at most `limit` clips from batch requests.
    pub fn with_batch_clip_limit(mut self, limit: usize) -> Self {
        self.batch_clip_limit = Some(limit);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn single_requests(&self) -> Vec<TtsRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Single(r) => Some(r),
                Call::Batch(_) => None,
            })
            .collect()
    }

    pub fn batch_requests(&self) -> Vec<TtsBatchRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Batch(r) => Some(r),
                Call::Single(_) => None,
            })
            .collect()
    }

    fn fails(&self, text: &str) -> bool {
        self.fail_on.as_deref() == Some(text)
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, request: &TtsRequest) -> Result<Vec<u8>, SynthesisError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call::Single(request.clone()));
            calls.iter().filter(|c| matches!(c, Call::Single(_))).count()
        };

        if self.fails(&request.text) {
            return Err(SynthesisError::new(Some(500), "synthesis failed"));
        }
        Ok(wav_bytes(&[n as i16]))
    }

    async fn synthesize_batch(
        &self,
        request: &TtsBatchRequest,
    ) -> Result<Vec<Vec<u8>>, SynthesisError> {
        self.calls.lock().unwrap().push(Call::Batch(request.clone()));

        if request.texts.iter().any(|t| self.fails(t)) {
            return Err(SynthesisError::new(Some(500), "batch synthesis failed"));
        }

        let count = self
            .batch_clip_limit
            .map_or(request.texts.len(), |limit| limit.min(request.texts.len()));
        Ok((0..count).map(|i| wav_bytes(&[i as i16 + 1])).collect())
    }
}
