// SPDX-License-Identifier: MIT OR Apache-2.0
//! `shaderweave` - shader node graph compiler
//!
//! Compiles a RON graph document into a GLSL fragment shader:
//! - Module registry listing
//! - Full graph and single-node preview compilation
//! - Include hot-reload with a compilation cache
//!
//! ## Architecture
//!
//! The driver owns one [`session::ShaderSession`] per graph document. In watch
//! mode a [`hot_reload::HotReloader`] feeds it debounced file events.

mod cli;
mod config;
mod file_watcher;
mod hot_reload;
mod session;

use cli::{Command, CompileArgs};
use config::AppConfig;
use hot_reload::HotReloader;
use session::{CompileRequest, ShaderSession};
use shaderweave_graph::{ModuleCategory, ModuleRegistry};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["shaderweave_app=debug", "shaderweave_graph=info"] {
        match directive.parse() {
            Ok(directive) => env_filter = env_filter.add_directive(directive),
            Err(e) => eprintln!("Ignoring log directive {directive}: {e}"),
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn list_modules(registry: &ModuleRegistry) {
    for category in ModuleCategory::all() {
        println!("{category}:");
        for type_name in registry.types_in_category(*category) {
            let description = registry
                .create(&type_name)
                .map(|module| module.description().to_string())
                .unwrap_or_default();
            println!("  {type_name:<12} {description}");
        }
    }
}

fn compile(args: CompileArgs, registry: Arc<ModuleRegistry>) -> Result<(), String> {
    let mut config = AppConfig::load_or_default(&args.config).map_err(|e| e.to_string())?;
    if args.watch {
        config.hot_reload = true;
    }

    let request = CompileRequest {
        graph_path: args.graph,
        preview: args.preview,
        output: args.out,
    };
    let mut session = ShaderSession::new(config, registry, request);

    let summary = session.compile_once().map_err(|e| e.to_string())?;
    if summary.warnings > 0 {
        tracing::warn!("Compiled with {} warning(s)", summary.warnings);
    }

    if !session.config().hot_reload {
        match serde_json::to_string_pretty(&session.stats()) {
            Ok(stats) => println!("{stats}"),
            Err(e) => tracing::warn!("Failed to serialize stats: {}", e),
        }
        return Ok(());
    }

    let mut reloader = HotReloader::new(session);
    reloader.start_watching().map_err(|e| e.to_string())?;

    let running = AtomicBool::new(true);
    let stats = reloader.run(&running);
    if stats.failed > 0 {
        tracing::warn!("{} reload(s) failed during the session", stats.failed);
    }
    Ok(())
}

fn main() {
    init_logging();

    let command = match cli::parse(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}\n\n{}", cli::USAGE);
            std::process::exit(2);
        }
    };

    let registry = Arc::new(ModuleRegistry::with_builtin_modules());
    match command {
        Command::Help => println!("{}", cli::USAGE),
        Command::ListModules => list_modules(&registry),
        Command::InitConfig(path) => {
            if let Err(e) = AppConfig::default().save(&path) {
                tracing::error!("Failed to write {:?}: {e}", path);
                std::process::exit(1);
            }
            println!("Wrote {}", path.display());
        }
        Command::Compile(args) => {
            tracing::info!("Starting shaderweave v{}", env!("CARGO_PKG_VERSION"));
            if let Err(e) = compile(args, registry) {
                tracing::error!("Compilation failed: {e}");
                std::process::exit(1);
            }
        }
    }
}
