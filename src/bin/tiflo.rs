//! Командная строка для редактирования таймлайна тифлокомментариев
//!
//! Проекты хранятся в JSON-хранилище (`store_dir` из конфигурации или
//! `<media_root>/timeline`). Ctrl+C отменяет текущую операцию до фиксации.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use tiflo_timeline::logger::init_logger;
use tiflo_timeline::store::open_store;
use tiflo_timeline::{
    format_time, Collaborators, DeletePolicy, EngineConfig, NarrationSource, ProjectEditor, Segment,
    SegmentKind, TimelineEngine,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Путь к JSON-конфигурации
    #[arg(short, long, default_value = "tiflo.json")]
    config: PathBuf,

    /// Заглушки вместо внешних AI-сервисов
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Создать проект из аудио или видео
    Import { project: Uuid, media: PathBuf },

    /// Вставить тифлокомментарий в точку hh:mm:ss.mmm
    Split {
        project: Uuid,
        at: String,
        /// Готовый текст
        #[arg(long, conflicts_with_all = ["image", "frame"])]
        text: Option<String>,
        /// Описать изображение
        #[arg(long, conflicts_with = "frame")]
        image: Option<PathBuf>,
        /// Описать кадр видео в точке вставки
        #[arg(long)]
        frame: Option<PathBuf>,
    },

    /// Заменить текст тифлокомментария
    Replace { project: Uuid, part: Uuid, text: String },

    /// Удалить сегмент
    Delete {
        project: Uuid,
        part: Uuid,
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },

    /// Склеить таймлайн в один файл
    Flatten { project: Uuid },

    /// Показать сегменты проекта
    Show { project: Uuid },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    CloseGap,
    MergeNeighbors,
}

impl From<PolicyArg> for DeletePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::CloseGap => DeletePolicy::CloseGap,
            PolicyArg::MergeNeighbors => DeletePolicy::MergeNeighbors,
        }
    }
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
    let mut config = if cli.config.exists() {
        EngineConfig::load(&cli.config)
            .with_context(|| format!("failed to load {}", cli.config.display()))?
    } else {
        warn!("{} not found, using defaults", cli.config.display());
        let mut config = EngineConfig::default();
        config.apply_env();
        config
    };

    if cli.mock {
        config.use_mock_ai = true;
    }
    if config.store_dir.is_none() {
        config.store_dir = Some(config.media_root.join("timeline"));
    }
    config.validate()?;
    Ok(config)
}

fn print_timeline(segments: &[Segment]) {
    for s in segments {
        let kind = match s.kind {
            SegmentKind::Original => "original",
            SegmentKind::Narration => "narration",
        };
        println!(
            "{}  {} - {}  {:<9}  {}  {}",
            s.id,
            format_time(s.start),
            format_time(s.end()),
            kind,
            s.path.display(),
            s.text
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let store = open_store(&config)?;
    let deps = Collaborators::from_config(&config, store)?;
    let engine = Arc::new(TimelineEngine::new(config, deps));
    let editor = ProjectEditor::new(engine);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling the current edit");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Import { project, media } => {
            let segment = editor.import_track(project, &media, &cancel).await?;
            info!("Project {} created", project);
            print_timeline(&[segment]);
        }
        Commands::Split {
            project,
            at,
            text,
            image,
            frame,
        } => {
            let source = match (text, image, frame) {
                (Some(text), _, _) => NarrationSource::Text(text),
                (None, Some(image), _) => NarrationSource::Image(image),
                (None, None, Some(video)) => NarrationSource::VideoFrame(video),
                (None, None, None) => anyhow::bail!("one of --text, --image or --frame is required"),
            };
            let outcome = editor.split(project, &at, source, &cancel).await?;
            println!("{}", outcome.narration.id);
        }
        Commands::Replace { project, part, text } => {
            let outcome = editor.replace_text(project, part, &text, &cancel).await?;
            println!("{} ({:+} ticks)", outcome.replaced.id, outcome.delta);
        }
        Commands::Delete {
            project,
            part,
            policy,
        } => {
            let outcome = match policy {
                Some(policy) => {
                    editor
                        .delete_with_policy(project, part, policy.into(), &cancel)
                        .await?
                }
                None => editor.delete(project, part, &cancel).await?,
            };
            if let Some(merged) = outcome.merged {
                println!("merged into {}", merged.id);
            }
        }
        Commands::Flatten { project } => {
            let output = editor.flatten(project, &cancel).await?;
            println!("{}", output.display());
        }
        Commands::Show { project } => {
            print_timeline(&editor.timeline(project).await?);
        }
    }

    Ok(())
}
