mod worker;
use anyhow::{anyhow, Result};
use clap::{arg, Command};
use latent_engine::annotate_batch;
use latent_engine::hierarchy::ScalingMode;
use latent_utils::{compress_obj, jsonify, load_json_arg};
use serde_json::json;
use std::{fs, path::PathBuf, sync::Arc};
use tokio::runtime::Runtime;
use worker::Settings;

fn cli() -> Command {
    Command::new("latent-worker")
        .about("Runs continuous latent-space reasoning")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("reason")
                .about("Runs the continuous thought loop from a token sequence")
                .arg(
                    arg!(<SETTINGS> "Settings json string or path to json file")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(<SEED> "A string used in seed generation")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(--thoughts [THOUGHTS] "Thought budget")
                        .default_value("10")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--tokens [TOKENS] "Comma separated token ids")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(arg!(--logits "Also project the final state to vocabulary logits")),
        )
        .subcommand(
            Command::new("logits")
                .about("Projects the hidden state of a token sequence to vocabulary logits")
                .arg(
                    arg!(<SETTINGS> "Settings json string or path to json file")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(<SEED> "A string used in seed generation")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(--tokens [TOKENS] "Comma separated token ids")
                        .value_parser(clap::value_parser!(String)),
                ),
        )
        .subcommand(
            Command::new("compute_batch")
                .about("Computes a batch of annotated latent states")
                .arg(
                    arg!(<SETTINGS> "Settings json string or path to json file")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(<SEED> "A string used in seed generation")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(<NUM_THOUGHTS> "Number of thoughts to annotate")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--scaling [MODE] "linear, exponential or adaptive")
                        .default_value("linear")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(--tokens [TOKENS] "Comma separated token ids")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(--output [OUTPUT_FOLDER] "If set, the annotated states are saved as 'data.zlib' in this folder")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("hierarchy")
                .about("Describes the hierarchy, channels and recursive structure for a thought count")
                .arg(
                    arg!(<NUM_THOUGHTS> "Number of thoughts")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--scaling [MODE] "linear, exponential or adaptive")
                        .default_value("linear")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(--depth [DEPTH] "Depth of the recursive structure")
                        .default_value("3")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--branching [BRANCHING] "Children per recursive node")
                        .default_value("2")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "latent_engine=info,latent_worker=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();

    if let Err(e) = match matches.subcommand() {
        Some(("reason", sub_m)) => reason(
            sub_m.get_one::<String>("SETTINGS").unwrap().clone(),
            sub_m.get_one::<String>("SEED").unwrap().clone(),
            *sub_m.get_one::<usize>("thoughts").unwrap(),
            sub_m.get_one::<String>("tokens").cloned(),
            sub_m.get_flag("logits"),
        ),
        Some(("logits", sub_m)) => logits(
            sub_m.get_one::<String>("SETTINGS").unwrap().clone(),
            sub_m.get_one::<String>("SEED").unwrap().clone(),
            sub_m.get_one::<String>("tokens").cloned(),
        ),
        Some(("compute_batch", sub_m)) => compute_batch(
            sub_m.get_one::<String>("SETTINGS").unwrap().clone(),
            sub_m.get_one::<String>("SEED").unwrap().clone(),
            *sub_m.get_one::<usize>("NUM_THOUGHTS").unwrap(),
            sub_m.get_one::<String>("scaling").unwrap().clone(),
            sub_m.get_one::<String>("tokens").cloned(),
            sub_m.get_one::<PathBuf>("output").cloned(),
        ),
        Some(("hierarchy", sub_m)) => hierarchy(
            *sub_m.get_one::<usize>("NUM_THOUGHTS").unwrap(),
            sub_m.get_one::<String>("scaling").unwrap().clone(),
            *sub_m.get_one::<usize>("depth").unwrap(),
            *sub_m.get_one::<usize>("branching").unwrap(),
        ),
        _ => Err(anyhow!("Invalid subcommand")),
    } {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn reason(
    settings: String,
    seed: String,
    num_thoughts: usize,
    tokens: Option<String>,
    with_logits: bool,
) -> Result<()> {
    let settings = load_settings(&settings)?;
    let tokens = parse_tokens(tokens.as_deref())?;
    let config = Arc::new(worker::build_model(&settings, &seed)?);
    let initial = worker::initial_state(&config, &tokens)?;

    let runtime = Runtime::new()?;
    let result = runtime.block_on(worker::run_reasoning(
        Arc::clone(&config),
        initial,
        num_thoughts,
        settings.reasoning.clone(),
    ))?;

    let output = if with_logits {
        let logits = latent_engine::hidden_state_to_logits(&config, &result.final_state)?;
        json!({
            "result": result,
            "top_tokens": worker::top_k(&logits, worker::TOP_TOKENS),
            "logits": logits,
        })
    } else {
        json!({ "result": result })
    };
    println!("{}", jsonify(&output));
    Ok(())
}

fn logits(settings: String, seed: String, tokens: Option<String>) -> Result<()> {
    let settings = load_settings(&settings)?;
    let tokens = parse_tokens(tokens.as_deref())?;
    let config = worker::build_model(&settings, &seed)?;
    println!("{}", jsonify(&worker::compute_logits(&config, &tokens)?));
    Ok(())
}

fn compute_batch(
    settings: String,
    seed: String,
    num_thoughts: usize,
    scaling: String,
    tokens: Option<String>,
    output_folder: Option<PathBuf>,
) -> Result<()> {
    if num_thoughts == 0 {
        return Err(anyhow!("Invalid number of thoughts. Must be non-zero"));
    }
    let scaling_mode = parse_scaling(&scaling)?;
    if let Some(path) = &output_folder {
        fs::create_dir_all(path)?;
    }

    let settings = load_settings(&settings)?;
    let tokens = parse_tokens(tokens.as_deref())?;
    let config = worker::build_model(&settings, &seed)?;
    let initial = worker::initial_state(&config, &tokens)?;
    let states = annotate_batch(
        &config,
        &initial,
        num_thoughts,
        scaling_mode,
        &settings.reasoning,
    )?;

    if let Some(path) = output_folder {
        let dump = path.join("data.zlib");
        fs::write(&dump, compress_obj(&states)?)?;
        log::info!("Saved {} latent states to {}", states.len(), dump.display());
    }
    let summary = worker::summarize_batch(&states, num_thoughts, scaling_mode);
    println!("{}", jsonify(&summary));
    Ok(())
}

fn hierarchy(num_thoughts: usize, scaling: String, depth: usize, branching: usize) -> Result<()> {
    let scaling_mode = parse_scaling(&scaling)?;
    let report = worker::describe_hierarchy(num_thoughts, scaling_mode, depth, branching)?;
    println!("{}", jsonify(&report));
    Ok(())
}

fn load_settings(settings: &str) -> Result<Settings> {
    load_json_arg::<Settings>(settings).map_err(|e| anyhow!("Failed to load settings: {}", e))
}

fn parse_scaling(scaling: &str) -> Result<ScalingMode> {
    scaling.parse::<ScalingMode>().map_err(|e| anyhow!(e))
}

fn parse_tokens(tokens: Option<&str>) -> Result<Vec<i64>> {
    match tokens {
        None => Ok(Vec::new()),
        Some(tokens) => tokens
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| {
                t.parse::<i64>()
                    .map_err(|_| anyhow!("Invalid token id '{}'", t))
            })
            .collect(),
    }
}
