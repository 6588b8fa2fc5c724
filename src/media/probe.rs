//! # Определение длительности аудио
//!
//! Длительность сегмента всегда берется из декодированного файла, а не из
//! запроса. Поддерживаются два контейнера со своими декодерами:
//!
//! - WAV (нарезки исходного аудио) - через `hound`, по количеству семплов;
//! - MP3 и прочие сжатые форматы (озвучка) - через `symphonia`, по числу
//!   кадров трека (заголовок Xing/Info или оценка по битрейту), а если
//!   демультиплексор его не знает, по сумме длительностей пакетов.

use std::fs::File;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hound::WavReader;
use log::{debug, warn};
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::config::resolve_media_path;
use crate::error::{Result, TimelineError};
use crate::segment::Tick;
use crate::time::TICKS_PER_SECOND;

/// Определение длительности медиафайла в тиках
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn duration(&self, path: &Path) -> Result<Tick>;
}

/// Проба на основе декодеров hound/symphonia
#[derive(Debug, Clone)]
pub struct AudioProbe {
    media_root: PathBuf,
}

impl AudioProbe {
    pub fn new(media_root: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
        }
    }
}

#[async_trait]
impl DurationProbe for AudioProbe {
    async fn duration(&self, path: &Path) -> Result<Tick> {
        let full_path = resolve_media_path(&self.media_root, path);
        let probe_path = full_path.clone();

        let ticks = tokio::task::spawn_blocking(move || probe_file(&probe_path))
            .await
            .map_err(|e| TimelineError::probe(&full_path, format!("probe task failed: {}", e)))??;

        debug!("Probed {}: {} ticks", full_path.display(), ticks);
        Ok(ticks)
    }
}

/// Синхронное определение длительности по расширению файла
pub fn probe_file(path: &Path) -> Result<Tick> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "wav" => probe_wav(path).or_else(|e| {
            // hound не понимает часть вариантов WAVE_FORMAT_EXTENSIBLE
            warn!("hound failed on {}: {}, falling back to symphonia", path.display(), e);
            probe_with_symphonia(path, Some("wav"))
        }),
        "" => probe_with_symphonia(path, None),
        other => probe_with_symphonia(path, Some(other)),
    }
}

/// Длительность WAV-файла по количеству семплов на канал
pub fn probe_wav(path: &Path) -> Result<Tick> {
    let reader = WavReader::open(path).map_err(|e| TimelineError::probe(path, e))?;
    let sample_rate = reader.spec().sample_rate;
    if sample_rate == 0 {
        return Err(TimelineError::probe(path, "zero sample rate"));
    }
    Ok(frames_to_ticks(reader.duration() as u64, sample_rate))
}

/// Длительность сжатого аудио через symphonia
pub fn probe_with_symphonia(path: &Path, extension: Option<&str>) -> Result<Tick> {
    let file = File::open(path).map_err(|e| TimelineError::probe(path, e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| TimelineError::probe(path, format!("unrecognized format: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| TimelineError::probe(path, "no audio track"))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| TimelineError::probe(path, "unknown sample rate"))?;

    if let Some(n_frames) = track.codec_params.n_frames {
        return Ok(frames_to_ticks(n_frames, sample_rate));
    }

    // Заголовка с числом кадров нет: суммируем длительности пакетов
    let mut frames: u64 = 0;
    loop {
        match format.next_packet() {
            Ok(packet) => {
                if packet.track_id() == track_id {
                    frames += packet.dur;
                }
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(TimelineError::probe(path, format!("demux error: {}", e))),
        }
    }

    Ok(frames_to_ticks(frames, sample_rate))
}

/// Семплы -> тики с усечением: `frames * 10 / rate`
pub fn frames_to_ticks(frames: u64, sample_rate: u32) -> Tick {
    (frames * TICKS_PER_SECOND as u64 / sample_rate as u64) as Tick
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};

    fn write_silence(path: &Path, sample_rate: u32, samples: u32) {
        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for _ in 0..samples {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn wav_duration_in_ticks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_silence(&path, 16_000, 16_000 * 8);
        assert_eq!(probe_file(&path).unwrap(), 80);
    }

    #[test]
    fn wav_duration_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.wav");
        // 0.19 c -> 1 тик
        write_silence(&path, 8_000, 1_520);
        assert_eq!(probe_wav(&path).unwrap(), 1);
    }

    #[test]
    fn missing_file_is_probe_failure() {
        let err = probe_file(Path::new("/definitely/not/here.mp3")).unwrap_err();
        assert!(matches!(err, TimelineError::ProbeFailed { .. }));
    }

    /// Кадр MPEG-1 Layer III: 128 кбит/с, 44.1 кГц, моно, без CRC, тишина
    fn mp3_frame() -> Vec<u8> {
        let mut frame = vec![0u8; 417];
        frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0xC0]);
        frame
    }

    /// Первый кадр с тегом Info, в котором записано число кадров
    fn info_frame(frames: u32) -> Vec<u8> {
        let mut frame = mp3_frame();
        // заголовок 4 байта + side info 17 байт для моно
        let at = 4 + 17;
        frame[at..at + 4].copy_from_slice(b"Info");
        frame[at + 4..at + 8].copy_from_slice(&1u32.to_be_bytes());
        frame[at + 8..at + 12].copy_from_slice(&frames.to_be_bytes());
        frame
    }

    fn write_mp3(path: &Path, info: Option<u32>, frames: usize) {
        let mut bytes = info.map(info_frame).unwrap_or_default();
        for _ in 0..frames {
            bytes.extend(mp3_frame());
        }
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn mp3_duration_from_info_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("narration.mp3");
        // 77 * 1152 / 44100 = 2.01 c
        write_mp3(&path, Some(77), 77);
        assert_eq!(probe_file(&path).unwrap(), 20);
    }

    #[test]
    fn mp3_duration_estimated_for_cbr_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cbr.mp3");
        // 50 * 1152 / 44100 = 1.31 c
        write_mp3(&path, None, 50);
        assert_eq!(probe_file(&path).unwrap(), 13);
    }

    #[test]
    fn short_mp3_duration_is_summed_from_packets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.mp3");
        // Слишком короткий поток для оценки по битрейту: 10 * 1152 / 44100 = 0.26 c
        write_mp3(&path, None, 10);

        let file = File::open(&path).unwrap();
        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let mut hint = Hint::new();
        hint.with_extension("mp3");
        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .unwrap();
        assert!(probed.format.tracks()[0].codec_params.n_frames.is_none());

        assert_eq!(probe_file(&path).unwrap(), 2);
    }

    #[tokio::test]
    async fn async_probe_reads_mp3_narration() {
        let dir = tempfile::tempdir().unwrap();
        write_mp3(&dir.path().join("tts.mp3"), Some(77), 77);
        let probe = AudioProbe::new(dir.path());
        assert_eq!(probe.duration(Path::new("tts.mp3")).await.unwrap(), 20);
    }

    #[test]
    fn garbage_mp3_is_probe_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, b"definitely not an mp3 stream").unwrap();
        assert!(matches!(
            probe_file(&path),
            Err(TimelineError::ProbeFailed { .. })
        ));
    }

    #[tokio::test]
    async fn async_probe_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        write_silence(&dir.path().join("part.wav"), 22_050, 22_050 * 3);
        let probe = AudioProbe::new(dir.path());
        assert_eq!(probe.duration(Path::new("part.wav")).await.unwrap(), 30);
    }

    #[test]
    fn frame_conversion() {
        assert_eq!(frames_to_ticks(44_100, 44_100), 10);
        assert_eq!(frames_to_ticks(44_099, 44_100), 9);
    }
}
