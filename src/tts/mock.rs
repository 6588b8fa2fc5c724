//! Заглушка синтезатора для работы без внешних AI-сервисов
//!
//! Пишет тишину в WAV: длина зависит от количества символов, чтобы
//! сдвиги на таймлайне оставались правдоподобными.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use log::debug;
use uuid::Uuid;

use crate::error::{Result, TimelineError};
use crate::segment::Tick;
use crate::time::TICKS_PER_SECOND;
use crate::tts::Synthesizer;

const SAMPLE_RATE: u32 = 16_000;
const MS_PER_CHAR: i64 = 70;
const MIN_TICKS: Tick = 10;

pub struct MockSynthesizer {
    media_root: PathBuf,
}

impl MockSynthesizer {
    pub fn new(media_root: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
        }
    }

    /// Длительность озвучки для текста
    pub fn ticks_for(text: &str) -> Tick {
        let chars = text.chars().filter(|c| !c.is_whitespace()).count() as i64;
        (chars * MS_PER_CHAR / 100).max(MIN_TICKS)
    }
}

/// Записать тишину заданной длины
pub fn write_silence(path: &Path, ticks: Tick) -> std::result::Result<(), hound::Error> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let samples = ticks.max(0) as u64 * SAMPLE_RATE as u64 / TICKS_PER_SECOND as u64;

    let mut writer = WavWriter::create(path, spec)?;
    for _ in 0..samples {
        writer.write_sample(0i16)?;
    }
    writer.finalize()
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<PathBuf> {
        if text.trim().is_empty() {
            return Err(TimelineError::SynthesisFailed("nothing to synthesize".to_string()));
        }

        tokio::fs::create_dir_all(&self.media_root).await?;
        let path = self.media_root.join(format!("{}.wav", Uuid::new_v4()));
        let ticks = Self::ticks_for(text);

        let target = path.clone();
        tokio::task::spawn_blocking(move || write_silence(&target, ticks))
            .await
            .map_err(|e| TimelineError::SynthesisFailed(format!("mock synthesis task failed: {}", e)))?
            .map_err(|e| TimelineError::SynthesisFailed(format!("mock synthesis failed: {}", e)))?;

        debug!("Mock narration of {} ticks written to {}", ticks, path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::probe::probe_file;

    #[tokio::test]
    async fn writes_probeable_silence() {
        let dir = tempfile::tempdir().unwrap();
        let synth = MockSynthesizer::new(dir.path());
        let text = "Группа мужчин стоит рядом с черной машиной";

        let path = synth.synthesize(text).await.unwrap();
        assert!(path.starts_with(dir.path()));
        assert_eq!(probe_file(&path).unwrap(), MockSynthesizer::ticks_for(text));
    }

    #[test]
    fn short_texts_get_minimum_length() {
        assert_eq!(MockSynthesizer::ticks_for("да"), MIN_TICKS);
    }
}
