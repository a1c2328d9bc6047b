use clap::{Parser, Subcommand};
use photosync_lib::commands::{self, AppContext, SelectionArgs};
use photosync_lib::config::{default_data_dir, AppConfig};
use photosync_lib::logging::{LogConfig, SizeRotatingWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{Directive, EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(name = "photosync")]
#[command(version)]
#[command(about = "Resumable one-way photo backup from an Android device over adb")]
struct Cli {
    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,

    /// 应用数据目录（配置文件与诊断日志）
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 将设备上的文件备份到本地目录
    Sync(SelectionArgs),

    /// 只显示同步计划，不传输任何文件
    Plan(SelectionArgs),

    /// 列出已连接的设备
    Devices {
        /// adb 可执行文件路径
        #[arg(long)]
        adb: Option<PathBuf>,
    },

    /// 显示当前配置
    Config {
        /// 将当前配置写入配置文件
        #[arg(long)]
        init: bool,
    },
}

/// 初始化日志系统
///
/// 文件日志写入数据目录下的 `photosync.log`；控制台只输出警告，`--verbose` 时输出调试信息。
fn init_logging(data_dir: &Path, config: &LogConfig, verbose: bool) -> Option<WorkerGuard> {
    let level = if verbose {
        config.tracing_level().max(tracing::Level::DEBUG)
    } else {
        config.tracing_level()
    };

    let mut env_filter = EnvFilter::from_default_env().add_directive(level.into());
    // sqlx 每条语句都会输出 info 日志
    if let Ok(directive) = "sqlx=warn".parse::<Directive>() {
        env_filter = env_filter.add_directive(directive);
    }

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(if verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::WARN
        });

    let (file_layer, guard) = if config.enabled {
        match SizeRotatingWriter::new(data_dir, config.max_size_bytes()) {
            Ok(writer) => {
                let (writer, guard) = tracing_appender::non_blocking(writer);
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false);
                (Some(layer), Some(guard))
            }
            Err(e) => {
                // 文件日志创建失败，只输出到控制台
                eprintln!("无法创建日志文件 {}: {}", data_dir.display(), e);
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);

    guard
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let config = AppConfig::load(&data_dir);

    // 保持 guard 存活直到退出，确保日志写完
    let _guard = init_logging(&data_dir, &config.log, cli.verbose);

    let ctx = AppContext { data_dir, config };

    let outcome = match cli.command {
        Commands::Sync(args) => commands::sync::execute(&args, &ctx).await.map(|_| ()),
        Commands::Plan(args) => commands::plan::execute(&args, &ctx).await.map(|_| ()),
        Commands::Devices { adb } => commands::devices::execute(adb.as_deref(), &ctx)
            .await
            .map(|_| ()),
        Commands::Config { init } => commands::settings::execute(init, &ctx),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
