//! Config command handlers: show effective configuration.

use crate::app::config_runtime::Settings;

pub(crate) fn run_config_show_command(settings: &Settings) {
    let resolved_path = settings.config_path.as_ref().map_or_else(
        || "<unresolved>".to_string(),
        |path| path.display().to_string(),
    );
    println!("config_path = {resolved_path}");
    println!(
        "config_file = {}",
        if settings.config_loaded {
            "loaded"
        } else {
            "not found (using defaults)"
        }
    );
    println!("db_path = {}", settings.db_path.display());
    println!("work_dir = {}", settings.work_dir.display());
    println!("concurrency = {}", settings.concurrency);
    println!("max_retries = {}", settings.max_retries);
    println!("connect_timeout_secs = {}", settings.connect_timeout_secs);
    println!("read_timeout_secs = {}", settings.read_timeout_secs);
    println!("max_copies = {}", settings.rules.max_copies);
    println!("min_deck_size = {}", settings.rules.min_deck_size);
    println!("fuzzy_threshold = {}", settings.rules.fuzzy_threshold);
    println!("ollama_url = {}", settings.ollama_url);
    println!("ollama_model = {}", settings.ollama_model);
    println!("db_max_connections = {}", settings.db_options.max_connections);
    println!("db_busy_timeout_ms = {}", settings.db_options.busy_timeout_ms);
}
