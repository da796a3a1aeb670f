//! Subcommand handlers for generate, script, and config actions.

use std::path::{Path, PathBuf};

use super::args::{ConfigAction, GenerateArgs};
use crate::config::{default_path, Config, DEFAULT_CONFIG_TEMPLATE};
use crate::extract::{context_client, gather_context, script_input};
use crate::reel::ReelGenerator;
use crate::request::{GenerationRequest, Prompt};
use crate::script::{parse_manual_script, Script, ScriptClient};

/// Load the config file, then apply environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<Config, String> {
    let mut config = Config::load(path).map_err(|e| e.to_string())?;
    config.apply_env().map_err(|e| e.to_string())?;
    Ok(config)
}

fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Runtime::new().map_err(|e| format!("Failed to create async runtime: {}", e))
}

/// Read prompts from a batch file: one per line, blank lines and `#`
/// comments skipped.
pub fn read_batch_prompts(path: &Path) -> Result<Vec<String>, String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read batch file '{}': {}", path.display(), e))?;
    let prompts: Vec<String> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect();
    if prompts.is_empty() {
        return Err(format!(
            "No prompts found in batch file '{}'. Expected one prompt per line.",
            path.display()
        ));
    }
    Ok(prompts)
}

fn read_script(path: &Path) -> Result<Script, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read script '{}': {}", path.display(), e))?;
    parse_manual_script(&text).map_err(|e| format!("Invalid script '{}': {}", path.display(), e))
}

/// Build the request for one prompt from flags and effective config.
pub fn build_request(
    prompt: &str,
    config: &Config,
    output: Option<PathBuf>,
) -> Result<GenerationRequest, String> {
    let prompt = Prompt::new(prompt).map_err(|e| e.to_string())?;
    Ok(GenerationRequest::new(prompt)
        .with_style(config.style.clone())
        .with_music(config.music.clone())
        .with_duration(config.duration)
        .with_output(output))
}

/// Run the generate command for a single prompt or a batch file.
pub fn run_generate(args: &GenerateArgs, config_path: Option<&Path>) -> Result<(), String> {
    let mut config = load_config(config_path)?;
    args.apply_to(&mut config);
    config.validate().map_err(|e| e.to_string())?;

    let script = args.script.as_deref().map(read_script).transpose()?;
    let generator = ReelGenerator::new(config)
        .with_script(script)
        .with_context_urls(args.context_urls.clone());

    if let Some(batch_file) = &args.batch {
        return run_batch(&generator, batch_file);
    }

    let prompt = args
        .prompt
        .as_deref()
        .ok_or("Either a prompt or --batch file must be provided")?;
    let request = build_request(prompt, generator.config(), args.output.clone())?;

    let rt = runtime()?;
    let reel = rt
        .block_on(generator.generate(&request))
        .map_err(|e| e.to_string())?;

    println!();
    println!("Reel ready!");
    println!("  Path:     {}", reel.path.display());
    println!("  Duration: {:.1}s", reel.duration);
    if let Some(title) = &reel.title {
        println!("  Title:    {}", title);
    }
    for artifact in &reel.artifacts {
        println!("  Timings:  {}", artifact.display());
    }
    Ok(())
}

fn run_batch(generator: &ReelGenerator, batch_file: &Path) -> Result<(), String> {
    let prompts = read_batch_prompts(batch_file)?;
    println!(
        "Batch generation: {} prompts from '{}'",
        prompts.len(),
        batch_file.display()
    );
    println!();

    let rt = runtime()?;
    let total = prompts.len();
    let mut completed = 0;
    let mut failed = 0;

    for (i, prompt) in prompts.iter().enumerate() {
        let progress = format!("[{}/{}]", i + 1, total);
        println!("{} Generating: \"{}\"", progress, prompt);

        let request = match build_request(prompt, generator.config(), None) {
            Ok(request) => request,
            Err(e) => {
                eprintln!("    Failed: {}", e);
                failed += 1;
                continue;
            }
        };

        match rt.block_on(generator.generate(&request)) {
            Ok(reel) => {
                println!("    Written: {}", reel.path.display());
                completed += 1;
            }
            Err(e) if e.is_interrupted() => {
                println!("    Interrupted, stopping batch");
                failed += total - i;
                break;
            }
            Err(e) => {
                eprintln!("    Failed: {}", e);
                failed += 1;
            }
        }
    }

    println!();
    println!("Batch complete:");
    println!("  Generated: {}", completed);
    if failed > 0 {
        println!("  Failed: {}", failed);
    }

    if failed > 0 && completed == 0 {
        Err("All prompts failed to generate".to_string())
    } else {
        Ok(())
    }
}

/// Generate a script for `topic` and print it as JSON.
pub fn run_script(
    topic: &str,
    context_urls: &[String],
    config_path: Option<&Path>,
) -> Result<(), String> {
    let config = load_config(config_path)?;
    if topic.trim().is_empty() {
        return Err("Topic must not be empty".to_string());
    }

    let rt = runtime()?;
    let script = rt.block_on(async {
        let context = if context_urls.is_empty() {
            String::new()
        } else {
            let client = context_client().map_err(|e| e.to_string())?;
            gather_context(&client, context_urls).await
        };
        let client = ScriptClient::from_config(&config.script).map_err(|e| e.to_string())?;
        client
            .generate(
                &script_input(topic, &context),
                &config.speakers,
                config.style.as_deref(),
            )
            .await
            .map_err(|e| e.to_string())
    })?;

    let json = serde_json::to_string_pretty(&script).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

/// Replace API keys with a short masked form for display.
fn mask_keys(config: &mut Config) {
    let mask = |key: &mut Option<String>| {
        if let Some(k) = key.as_mut() {
            let visible: String = k.chars().take(4).collect();
            *k = format!("{}...", visible);
        }
    };
    mask(&mut config.visuals.api_key);
    mask(&mut config.script.api_key);
    mask(&mut config.voice.api_key);
}

/// Handle config subcommand actions.
pub fn handle_config_action(action: ConfigAction, path: Option<&Path>) -> Result<(), String> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(default_path);
    match action {
        ConfigAction::Show => {
            let mut config = load_config(path)?;
            mask_keys(&mut config);

            if config_path.exists() {
                println!("# Config file: {} (exists)", config_path.display());
            } else {
                println!("# Config file: {} (not found, using defaults)", config_path.display());
            }
            println!();
            let rendered = toml::to_string_pretty(&config).map_err(|e| e.to_string())?;
            println!("{}", rendered);
            Ok(())
        }
        ConfigAction::Init => {
            init_config(&config_path)?;
            println!("Created config file: {}", config_path.display());
            Ok(())
        }
    }
}

/// Write the commented default config to `path`, refusing to overwrite.
pub fn init_config(path: &Path) -> Result<(), String> {
    if path.exists() {
        return Err(format!(
            "Config file already exists: {}\nUse 'reelgen config show' to view current settings.",
            path.display()
        ));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Error creating config directory: {}", e))?;
    }
    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)
        .map_err(|e| format!("Error writing config file: {}", e))
}
