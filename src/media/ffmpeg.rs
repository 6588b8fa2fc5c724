//! Реализация нарезки, склейки и извлечения через FFmpeg
//!
//! Каждый вызов пишет результат в новый файл `<uuid>.<ext>` в корне медиа.
//! Процессы запускаются через `tokio::process` с `kill_on_drop`, поэтому
//! отмена future операции останавливает и ffmpeg.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use log::{debug, error};
use tokio::process::Command;
use uuid::Uuid;

use crate::config::{resolve_media_path, EngineConfig};
use crate::error::{Result, TimelineError};
use crate::media::{MediaCutter, MediaExtractor};
use crate::segment::Tick;
use crate::time::format_time;

/// Сколько последних строк stderr ffmpeg прикладывать к ошибке
const STDERR_TAIL_LINES: usize = 5;

/// Обертка над бинарником ffmpeg
#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    ffmpeg: String,
    media_root: PathBuf,
}

impl FfmpegToolkit {
    pub fn new(ffmpeg: impl Into<String>, media_root: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            media_root: media_root.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.ffmpeg_path.clone(), config.media_root.clone())
    }

    /// Проверка наличия FFmpeg
    pub async fn check_installed(&self) -> bool {
        Command::new(&self.ffmpeg)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn output_path(&self, extension: &str) -> PathBuf {
        self.media_root.join(format!("{}.{}", Uuid::new_v4(), extension))
    }

    fn input_path(&self, path: &Path) -> PathBuf {
        resolve_media_path(&self.media_root, path)
    }

    /// Запуск команды FFmpeg; при ошибке возвращает хвост stderr
    async fn run(&self, args: &[String]) -> std::result::Result<(), String> {
        debug!("{} {}", self.ffmpeg, args.join(" "));
        tokio::fs::create_dir_all(&self.media_root)
            .await
            .map_err(|e| format!("cannot create {}: {}", self.media_root.display(), e))?;

        let output = Command::new(&self.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("failed to start {}: {}", self.ffmpeg, e))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let lines: Vec<&str> = stderr.lines().collect();
        let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join(" | ");
        error!("FFmpeg failed with {}: {}", output.status, tail);
        Err(format!("ffmpeg exited with {}: {}", output.status, tail))
    }
}

/// Аргументы вырезки `[from, to)` в PCM WAV: перекодирование дает точную по семплам длину
pub fn cut_args(input: &Path, from: Tick, to: Tick, output: &Path) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-vn".to_string(),
        "-acodec".to_string(),
        "pcm_s16le".to_string(),
        "-ss".to_string(),
        format_time(from),
        "-t".to_string(),
        format_time(to - from),
        output.to_string_lossy().to_string(),
    ]
}

/// Аргументы склейки N файлов через фильтр concat:
/// `-i a -i b -filter_complex '[0:a][1:a]concat=n=2:v=0:a=1[out]' -map '[out]' out.wav`
pub fn concat_args(inputs: &[PathBuf], output: &Path) -> Vec<String> {
    let mut args = vec!["-hide_banner".to_string(), "-y".to_string()];
    let mut filter = String::new();

    for (i, input) in inputs.iter().enumerate() {
        args.push("-i".to_string());
        args.push(input.to_string_lossy().to_string());
        filter.push_str(&format!("[{}:a]", i));
    }
    filter.push_str(&format!("concat=n={}:v=0:a=1[out]", inputs.len()));

    args.extend([
        "-filter_complex".to_string(),
        filter,
        "-map".to_string(),
        "[out]".to_string(),
        "-acodec".to_string(),
        "pcm_s16le".to_string(),
        output.to_string_lossy().to_string(),
    ]);
    args
}

#[async_trait]
impl MediaCutter for FfmpegToolkit {
    async fn cut(&self, path: &Path, from: Tick, to: Tick) -> Result<PathBuf> {
        if from < 0 || to < from {
            return Err(TimelineError::CutterFailed(format!(
                "invalid cut range {}..{} for {}",
                from,
                to,
                path.display()
            )));
        }

        let input = self.input_path(path);
        let output = self.output_path("wav");
        self.run(&cut_args(&input, from, to, &output))
            .await
            .map_err(|e| TimelineError::CutterFailed(format!("cut {}: {}", input.display(), e)))?;

        Ok(output)
    }

    async fn concat(&self, paths: &[PathBuf]) -> Result<PathBuf> {
        if paths.is_empty() {
            return Err(TimelineError::CutterFailed("nothing to concatenate".to_string()));
        }

        let inputs: Vec<PathBuf> = paths.iter().map(|p| self.input_path(p)).collect();
        let output = self.output_path("wav");
        self.run(&concat_args(&inputs, &output))
            .await
            .map_err(|e| TimelineError::CutterFailed(format!("concat of {} files: {}", inputs.len(), e)))?;

        Ok(output)
    }
}

#[async_trait]
impl MediaExtractor for FfmpegToolkit {
    async fn extract_frame(&self, video: &Path, at: Tick) -> Result<PathBuf> {
        let input = self.input_path(video);
        let output = self.output_path("png");
        let args = vec![
            "-hide_banner".to_string(),
            "-y".to_string(),
            "-ss".to_string(),
            format_time(at),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            output.to_string_lossy().to_string(),
        ];
        self.run(&args).await.map_err(|e| {
            TimelineError::CutterFailed(format!("frame at {} of {}: {}", format_time(at), input.display(), e))
        })?;
        Ok(output)
    }

    async fn extract_audio(&self, video: &Path) -> Result<PathBuf> {
        let input = self.input_path(video);
        let output = self.output_path("wav");
        let args = vec![
            "-hide_banner".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-vn".to_string(),
            "-acodec".to_string(),
            "pcm_s16le".to_string(),
            output.to_string_lossy().to_string(),
        ];
        self.run(&args).await.map_err(|e| {
            TimelineError::CutterFailed(format!("audio extraction from {}: {}", input.display(), e))
        })?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cut_arguments_use_file_relative_offsets() {
        let args = cut_args(Path::new("/m/src.wav"), 500, 1000, Path::new("/m/out.wav"));
        let joined = args.join(" ");
        assert!(joined.contains("-ss 00:00:50.000 -t 00:00:50.000"));
        assert!(joined.contains("-acodec pcm_s16le"));
        assert_eq!(args.last().unwrap(), "/m/out.wav");
    }

    #[test]
    fn concat_filter_keeps_input_order() {
        let inputs = vec![PathBuf::from("b.wav"), PathBuf::from("a.wav"), PathBuf::from("c.wav")];
        let args = concat_args(&inputs, Path::new("out.wav"));
        let inputs_in_args: Vec<&str> = args
            .iter()
            .zip(args.iter().skip(1))
            .filter(|(flag, _)| flag.as_str() == "-i")
            .map(|(_, value)| value.as_str())
            .collect();
        assert_eq!(inputs_in_args, vec!["b.wav", "a.wav", "c.wav"]);
        assert!(args.contains(&"[0:a][1:a][2:a]concat=n=3:v=0:a=1[out]".to_string()));
    }

    #[tokio::test]
    async fn missing_binary_is_cutter_failure() {
        let toolkit = FfmpegToolkit::new("/nonexistent/ffmpeg-binary", std::env::temp_dir());
        let err = toolkit.cut(Path::new("in.wav"), 0, 10).await.unwrap_err();
        assert!(matches!(err, TimelineError::CutterFailed(_)));
        assert!(!toolkit.check_installed().await);
    }

    #[tokio::test]
    async fn empty_concat_is_rejected() {
        let toolkit = FfmpegToolkit::new("ffmpeg", std::env::temp_dir());
        assert!(matches!(
            toolkit.concat(&[]).await,
            Err(TimelineError::CutterFailed(_))
        ));
    }
}
