//! # rc-sim
//!
//! 仿真关节台架：按配置注册仿真关节，加载控制器，
//! 在专用线程上以固定频率驱动 `ControllerManager::update()`，
//! 同时从 stdin 接收启动/停止请求。
//!
//! ```bash
//! rc-sim --config apps/sim/config/shoulder.toml --start pan_ctrl
//! start head_ctrl
//! start head_ctrl failed (code -2): Controller 'head_ctrl' conflicts with running 'pan_ctrl' ...
//! stop pan_ctrl
//! start head_ctrl
//! quit
//! ```
//!
//! ## 线程
//!
//! - 控制线程：`run_update_loop`，每周期先推进仿真关节再 update
//! - 输入线程：逐行读取 stdin，经通道发送给主线程
//! - 主线程：执行命令；Ctrl+C 或 `quit` 设置停止标志

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{RecvTimeoutError, bounded};
use robot_controllers_interface::{
    ControllerManager, ControllerRegistry, SimulatedJoint, run_update_loop,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::info;

mod commands;
mod config;

use commands::Command;
use config::BenchConfig;

/// 控制器管理器仿真台架
#[derive(Parser, Debug)]
#[command(name = "rc-sim")]
#[command(about = "Drive a controller manager against simulated joints", long_about = None)]
#[command(version)]
struct Args {
    /// 配置文件（TOML）
    #[arg(short, long)]
    config: PathBuf,

    /// 覆盖控制频率（Hz）
    #[arg(short, long)]
    frequency: Option<f64>,

    /// 运行指定周期数后退出
    #[arg(short = 'n', long)]
    iterations: Option<u64>,

    /// 启动后立即请求启动的控制器（可重复）
    #[arg(short, long = "start")]
    start: Vec<String>,

    /// 不读取 stdin（配合 --iterations 批量运行）
    #[arg(long)]
    no_input: bool,
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("robot_controllers_interface=info".parse()?)
                .add_directive("rc_sim=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let (bench, manager_config) = BenchConfig::load(&args.config)?;

    let mut loop_config = bench.loop_config.clone();
    if let Some(frequency) = args.frequency {
        loop_config.frequency_hz = frequency;
    }
    if args.iterations.is_some() {
        loop_config.max_iterations = args.iterations;
    }
    loop_config.validate().context("Invalid loop configuration")?;

    // 1. 关节
    let mut manager = ControllerManager::new();
    let mut joints: Vec<Arc<SimulatedJoint>> = Vec::with_capacity(bench.joints.len());
    for spec in &bench.joints {
        let joint = Arc::new(spec.build());
        manager
            .add_joint_handle(joint.clone())
            .with_context(|| format!("Failed to register joint '{}'", spec.name))?;
        joints.push(joint);
    }

    // 2. 控制器
    let mut registry = ControllerRegistry::new();
    robot_controllers::register_builtin(&mut registry);
    manager
        .init(&manager_config, &registry)
        .context("Failed to initialize controller manager")?;

    for name in &args.start {
        manager
            .request_start(name)
            .with_context(|| format!("Failed to start controller '{}'", name))?;
    }

    let manager = Arc::new(manager);
    let stop = Arc::new(AtomicBool::new(false));

    // 3. Ctrl+C
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nReceived interrupt signal. Shutting down...");
            stop.store(true, Ordering::Release);
        })
        .context("Failed to set signal handler")?;
    }

    // 4. 控制线程
    let control = {
        let manager = manager.clone();
        let stop = stop.clone();
        thread::Builder::new()
            .name("rc-control".to_string())
            .spawn(move || {
                run_update_loop(&manager, &loop_config, &stop, |dt| {
                    for joint in &joints {
                        joint.step(dt);
                    }
                })
            })
            .context("Failed to spawn control thread")?
    };

    // 5. 输入线程 + 命令循环
    if args.no_input {
        while !stop.load(Ordering::Acquire) && !control.is_finished() {
            thread::sleep(Duration::from_millis(50));
        }
    } else {
        run_commands(&manager, &stop, &control);
    }

    stop.store(true, Ordering::Release);
    let stats = control
        .join()
        .map_err(|_| anyhow::anyhow!("Control thread panicked"))??;

    let metrics = manager.metrics();
    info!(
        iterations = stats.iterations,
        clamped = stats.clamped,
        overruns = stats.overruns,
        controller_updates = metrics.controller_updates,
        update_failures = metrics.update_failures,
        start_conflicts = metrics.start_conflicts,
        "Simulation finished"
    );
    println!("{}", Command::List.execute(&manager));
    println!("{}", Command::Joints.execute(&manager));
    Ok(())
}

/// 读取 stdin 命令直到 `quit`、EOF、停止标志或控制线程退出
fn run_commands<T>(
    manager: &ControllerManager,
    stop: &AtomicBool,
    control: &thread::JoinHandle<T>,
) {
    let (line_tx, line_rx) = bounded::<String>(16);

    // 输入线程阻塞在 stdin 上，不 join
    let _input = thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    println!("rc-sim ready, type 'help' for commands");
    while !stop.load(Ordering::Acquire) && !control.is_finished() {
        let line = match line_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        match Command::parse(&line) {
            Ok(None) => {},
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => println!("{}", command.execute(manager)),
            Err(message) => eprintln!("{}", message),
        }
    }
}
