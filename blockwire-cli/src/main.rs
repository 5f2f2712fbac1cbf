use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use blockwire_core::{
    BackendKind, BlockCatalog, HeadlessContext, RunConfig, compile_wasm, load_backend,
    load_library, load_program, read_document,
};
use clap::Parser;
use glam::Vec2;
use tracing_subscriber::EnvFilter;

/// Run a block program headlessly and print what it did.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(short, long, value_name = "PATH", help = "Program document (.json)")]
    input: PathBuf,

    #[arg(
        long,
        value_name = "DIR",
        help = "Directory of custom-block documents to load alongside the program"
    )]
    library: Option<PathBuf>,

    #[arg(long, value_name = "PATH", help = "Run settings (.json)")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "BACKEND", help = "Execution backend: interpreter, compiled")]
    backend: Option<String>,

    #[arg(long, help = "Number of frames to simulate")]
    frames: Option<u32>,

    #[arg(long, value_name = "PATH", help = "Also write the compiled wasm module here")]
    emit_wasm: Option<PathBuf>,

    #[arg(long, value_name = "FILTER", help = "Log filter used when RUST_LOG is unset")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    init_tracing(&config.log_level);
    execute(&cli, &config)
}

fn resolve_config(cli: &Cli) -> Result<RunConfig> {
    let mut config = match &cli.config {
        Some(path) => RunConfig::from_json_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(name) = &cli.backend {
        config.backend = parse_backend(name)?;
    }
    if let Some(frames) = cli.frames {
        config.frames = frames;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    Ok(config)
}

fn parse_backend(name: &str) -> Result<BackendKind> {
    match name {
        "interpreter" => Ok(BackendKind::Interpreter),
        "compiled" => Ok(BackendKind::Compiled),
        other => Err(anyhow::anyhow!("unsupported backend: {other}")),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // a second init (tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn execute(cli: &Cli, config: &RunConfig) -> Result<()> {
    let document = read_document(&cli.input)
        .with_context(|| format!("failed to read program {}", cli.input.display()))?;
    let library = match &cli.library {
        Some(root) => load_library(root)
            .with_context(|| format!("failed to load library {}", root.display()))?,
        None => Vec::new(),
    };
    let catalog = BlockCatalog::stock()?;
    let program = Arc::new(load_program(&catalog, document, library)?);
    tracing::info!(
        nodes = program.nodes.len(),
        entry_points = program.entry_points.len(),
        memo_points = program.memo_points.len(),
        "program analysed"
    );

    if let Some(path) = &cli.emit_wasm {
        let artifact = compile_wasm(&program)?;
        write_output(path, &artifact.wasm)?;
    }

    let ctx = HeadlessContext::new(config.random_seed)
        .with_screen_size(Vec2::from_array(config.screen_size));
    let log = ctx.log();
    let mut backend = load_backend(config.backend, program, Box::new(ctx))?;
    for frame in 0..config.frames {
        let late = backend
            .run_frame()
            .with_context(|| format!("frame {frame} failed"))?;
        backend
            .run_late_update(late)
            .with_context(|| format!("late update of frame {frame} failed"))?;
    }

    for line in log.lines() {
        println!("{line}");
    }
    for (name, ty, values) in backend.variables().iter() {
        println!("{name}: {ty} = {values:?}");
    }
    Ok(())
}

fn write_output(path: &PathBuf, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(path, bytes).with_context(|| format!("failed to write output file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_cmd::Command;
    use predicates::prelude::*;
    use std::fs;
    use tempfile::tempdir;

    const WIN: &str = r#"{
        "main": {
            "id": 0,
            "nodes": [{ "pos": [0, 0, 0], "kind": 252 }]
        }
    }"#;

    fn cli() -> Command {
        Command::cargo_bin("blockwire-cli").expect("binary exists")
    }

    #[test]
    fn runs_on_the_interpreter() {
        let dir = tempdir().expect("tempdir");
        let input = dir.path().join("win.json");
        fs::write(&input, WIN).expect("write input");

        cli()
            .arg("--input")
            .arg(&input)
            .arg("--frames")
            .arg("2")
            .assert()
            .success()
            .stdout(predicate::str::contains("win(0)").count(2));
    }

    #[test]
    fn compiled_backend_emits_wasm() {
        let dir = tempdir().expect("tempdir");
        let input = dir.path().join("win.json");
        fs::write(&input, WIN).expect("write input");
        let output = dir.path().join("out").join("win.wasm");

        cli()
            .arg("--input")
            .arg(&input)
            .arg("--backend")
            .arg("compiled")
            .arg("--emit-wasm")
            .arg(&output)
            .assert()
            .success()
            .stdout(predicate::str::contains("win(0)"));

        let wasm = fs::read(&output).expect("read wasm");
        assert!(wasm.starts_with(b"\0asm"));
    }

    #[test]
    fn config_file_sets_frames() {
        let dir = tempdir().expect("tempdir");
        let input = dir.path().join("win.json");
        fs::write(&input, WIN).expect("write input");
        let config = dir.path().join("run.json");
        fs::write(&config, r#"{ "frames": 3, "backend": "compiled" }"#).expect("write config");

        cli()
            .arg("--input")
            .arg(&input)
            .arg("--config")
            .arg(&config)
            .assert()
            .success()
            .stdout(predicate::str::contains("win(0)").count(3));
    }

    #[test]
    fn reports_missing_input() {
        let dir = tempdir().expect("tempdir");
        cli()
            .arg("--input")
            .arg(dir.path().join("missing.json"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("failed to read program"));
    }

    #[test]
    fn reports_missing_library() {
        let dir = tempdir().expect("tempdir");
        let input = dir.path().join("win.json");
        fs::write(&input, WIN).expect("write input");

        cli()
            .arg("--input")
            .arg(&input)
            .arg("--library")
            .arg(dir.path().join("blocks"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("failed to load library"));
    }

    #[test]
    fn rejects_unknown_backends() {
        let dir = tempdir().expect("tempdir");
        let input = dir.path().join("win.json");
        fs::write(&input, WIN).expect("write input");

        cli()
            .arg("--input")
            .arg(&input)
            .arg("--backend")
            .arg("jit")
            .assert()
            .failure()
            .stderr(predicate::str::contains("unsupported backend: jit"));
    }
}
