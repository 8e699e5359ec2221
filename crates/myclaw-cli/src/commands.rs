//! One-shot subcommands: `run`, `config`, `doctor`, `init`.

use anyhow::{Context, Result};

use myclaw_runtime::Runtime;
use myclaw_settings::{Config, ProviderKind};
use myclaw_workspace::run_program;

use crate::approval::TerminalApproval;

/// `myclaw run <task>` — one session, one turn, print the result.
pub async fn run(config: Config, task: &str) -> Result<()> {
    let runtime = Runtime::new(config);
    let session_id = runtime
        .create_session()
        .context("failed to create session")?;

    let approval = TerminalApproval;
    let result = runtime.run_turn(session_id, task, Some(&approval)).await;
    let _ = runtime.close_session(session_id);
    runtime.flush().await;

    let text = result.context("turn failed")?;
    println!("{text}");
    Ok(())
}

/// `myclaw config` — print the effective configuration.
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// `myclaw doctor` — probe the pieces a session depends on.
pub async fn doctor(config: &Config) -> Result<()> {
    let mut failures = 0usize;

    let home = config.home_dir();
    report("state directory", home.exists(), &home.display().to_string());

    let workspace = if config.workspace.is_empty() {
        std::env::current_dir()?.display().to_string()
    } else {
        config.workspace.clone()
    };
    report(
        "workspace",
        std::path::Path::new(&workspace).is_dir(),
        &workspace,
    );

    match myclaw_runtime::factory::build_provider(config) {
        Ok(provider) => report("provider", true, provider.name()),
        Err(e) => {
            report("provider", false, &e.to_string());
            failures += 1;
        }
    }
    if config.provider == ProviderKind::Mock {
        println!("  note: mock provider echoes input; set provider=openai or anthropic for real runs");
    }

    let cwd = std::env::current_dir()?;
    for (name, args) in [
        ("node", vec!["--version"]),
        ("python3", vec!["--version"]),
        ("npx", vec!["--version"]),
    ] {
        let available = run_program(name, &args, &cwd).await.is_ok();
        report(&format!("check tool: {name}"), available, "");
    }

    if failures > 0 {
        anyhow::bail!("{failures} fatal problem(s) found");
    }
    Ok(())
}

fn report(label: &str, ok: bool, detail: &str) {
    let mark = if ok { "ok" } else { "FAIL" };
    if detail.is_empty() {
        println!("[{mark}] {label}");
    } else {
        println!("[{mark}] {label}: {detail}");
    }
}

/// `myclaw init` — create the state directory skeleton.
pub fn init(config: &Config) -> Result<()> {
    let home = config.home_dir();
    std::fs::create_dir_all(home.join("sessions"))?;
    std::fs::create_dir_all(home.join("metrics"))?;

    let config_path = home.join("config.json");
    if !config_path.exists() {
        std::fs::write(
            &config_path,
            serde_json::to_string_pretty(&Config::default())?,
        )?;
        println!("wrote {}", config_path.display());
    }

    let env_path = home.join(".env");
    if !env_path.exists() {
        std::fs::write(
            &env_path,
            "# API keys for real providers\n# OPENAI_API_KEY=\n# ANTHROPIC_API_KEY=\n",
        )?;
        println!("wrote {}", env_path.display());
    }

    let memory_path = config.memory_file();
    if !memory_path.exists() {
        std::fs::write(&memory_path, "# myclaw memory\n")?;
        println!("wrote {}", memory_path.display());
    }

    println!("initialized {}", home.display());
    Ok(())
}
