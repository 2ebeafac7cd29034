//! vmdap CLI - stdio 上の DAP アダプタ
//!
//! スクリプト VM のデバッグアダプタ。`replay` はシナリオをインメモリ VM で再生しながら
//! 標準入出力で DAP を話す。ログは標準エラーに出す（標準出力は DAP ストリーム）。

mod replay;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use replay::{Replayer, Scenario};
use server::ProtocolWriter;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use vmdap_bytecode::ListingDecompiler;
use vmdap_core::{DebugSession, Debugger, DebuggerConfig};
use vmdap_target::{SimVm, WorkerTaskQueue};

/// vmdap - Debug adapter for script VMs
#[derive(Parser)]
#[command(name = "vmdap")]
#[command(version)]
#[command(about = "Debug Adapter Protocol server for a script virtual machine", long_about = None)]
struct Cli {
    /// Log filter such as `info` or `vmdap_core=debug` (defaults to RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: AdapterCommand,
}

#[derive(Subcommand)]
enum AdapterCommand {
    /// Replay a VM scenario and serve DAP over stdio
    Replay {
        /// Path to the scenario JSON file
        scenario: PathBuf,

        /// Polling interval of a paused VM thread in milliseconds
        #[arg(long, default_value_t = 100)]
        poll_interval_ms: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match cli.command {
        AdapterCommand::Replay {
            scenario,
            poll_interval_ms,
        } => {
            let config = DebuggerConfig::default()
                .with_poll_interval(Duration::from_millis(poll_interval_ms.max(1)));
            run_replay(&scenario, config)
        }
    }
}

/// ログ出力を初期化する（出力先は標準エラー）
fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

/// シナリオを再生しながら DAP セッションを処理する
fn run_replay(path: &Path, config: DebuggerConfig) -> Result<()> {
    let scenario = Scenario::load(path)?;
    tracing::info!(
        "loaded scenario {} ({} scripts, {} steps)",
        path.display(),
        scenario.scripts.len(),
        scenario.steps.len()
    );

    let vm = Arc::new(SimVm::new());
    let loader = scenario.loader();
    let tasks = Arc::new(WorkerTaskQueue::spawn("vmdap-tasks")?);
    let writer = Arc::new(ProtocolWriter::new(BufWriter::new(io::stdout())));

    let debugger = Debugger::attach(
        vm.clone(),
        tasks.clone(),
        writer.clone(),
        loader.clone(),
        Arc::new(ListingDecompiler),
        config,
    );

    let replayer = Replayer::new(vm, loader, &scenario)?;
    let vm_thread = {
        let debugger = debugger.clone();
        let steps = scenario.steps.clone();
        let delay = Duration::from_millis(scenario.start_delay_ms);
        thread::Builder::new()
            .name("vmdap-vm".to_string())
            .spawn(move || {
                thread::sleep(delay);
                if let Err(err) = replayer.run(&steps, &debugger) {
                    tracing::error!("replay stopped: {:#}", err);
                }
            })
            .context("failed to start the VM thread")?
    };

    let session = DebugSession::new(debugger.clone(), writer.clone());
    let result = server::serve(io::stdin().lock(), &session, &writer);

    // 停止中の VM スレッドを解放してから終了する
    debugger.disconnect();
    if vm_thread.join().is_err() {
        tracing::error!("VM thread panicked");
    }
    drop(session);
    drop(debugger);
    tasks.shutdown();

    result
}
