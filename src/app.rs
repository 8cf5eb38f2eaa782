use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::{error::ErrorKind, CommandFactory, Parser};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::context::QueryContext;
use crate::gallery::{GalleryOptions, ScaleMode, ScaleOptions, DEFAULT_COLUMNS};
use crate::gallery::scale::{DEFAULT_DIVISOR_STEP, DEFAULT_THUMBNAIL_LIMIT};
use crate::navigation::Direction;
use crate::output::{self, OutputFormat};
use crate::runner::{Options, RecordSource, RunResult, Runner};

fn print_banner() {
    const BANNER: &str = r#"
        __      __              ____
   ____/ /___  / /_____ _____ _/ / /__  _______  __
  / __  / __ \/ __/ __ `/ __ `/ / / _ \/ ___/ / / /
 / /_/ / /_/ / /_/ /_/ / /_/ / / /  __/ /  / /_/ /
/ .___/\____/\__/\__, /\__,_/_/_/\___/_/   \__, /
/_/             /____/                    /____/
       plotgallery - comparison plot gallery
    "#;
    eprint!("{}", BANNER);
    eprintln!();
}

fn tag(label: &str) -> String {
    let colored_label = match label {
        "INF" => label.bold().cyan(),
        "WRN" => label.bold().yellow(),
        _ => label.bold().red(),
    };
    format!("{}{}{}", "[".bold().white(), colored_label, "]".bold().white())
}

fn info(message: &str) {
    eprintln!("{} {}", tag("INF"), message);
}

fn warn(message: &str) {
    eprintln!("{} {}", tag("WRN"), message);
}

fn format_kv_line(label: &str, value: &str) {
    eprintln!(":: {:<10}: {}", label, value);
}

fn format_opt_value<'a>(v: &'a str, default: &'a str) -> &'a str {
    if v.trim().is_empty() {
        default
    } else {
        v
    }
}

fn render_custom_help() -> String {
    let cmd = CliArgs::command();
    let mut out = format!(
        "{} {}\n",
        cmd.get_name(),
        cmd.get_version().unwrap_or_default()
    );
    if let Some(long_about) = cmd.get_long_about().or_else(|| cmd.get_about()) {
        out.push('\n');
        out.push_str(&long_about.to_string());
        out.push('\n');
    }
    out.push_str(&format!("\nUsage: {} [OPTIONS]\n\n", cmd.get_name()));

    let mut headings: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<&clap::Arg>> = HashMap::new();
    for arg in cmd.get_arguments().filter(|a| !a.is_hide_set()) {
        let heading = arg.get_help_heading().unwrap_or("Options").to_string();
        if !grouped.contains_key(&heading) {
            headings.push(heading.clone());
        }
        grouped.entry(heading).or_default().push(arg);
    }

    for heading in headings {
        out.push_str(&heading);
        out.push_str(":\n");
        for arg in grouped.get(&heading).map(Vec::as_slice).unwrap_or_default() {
            let mut parts: Vec<String> = Vec::new();
            if let Some(short) = arg.get_short() {
                parts.push(format!("-{short}"));
            }
            if let Some(long) = arg.get_long() {
                parts.push(format!("--{long}"));
            }
            for alias in arg.get_visible_aliases().unwrap_or_default() {
                let rendered = format!("--{alias}");
                if !parts.contains(&rendered) {
                    parts.push(rendered);
                }
            }
            let mut flags = parts.join(", ");
            if arg.get_action().takes_values() {
                let value_name = arg
                    .get_value_names()
                    .and_then(|names| names.first())
                    .map(|name| name.as_str())
                    .unwrap_or("VALUE");
                flags.push_str(&format!(" <{value_name}>"));
            }
            out.push_str(&format!("  {flags}\n"));
            if let Some(help) = arg.get_help() {
                out.push_str(&format!("          {}\n", help.to_string().trim()));
            }
            out.push('\n');
        }
    }
    out
}

#[derive(Clone, Debug)]
struct RunConfig {
    verbose: u8,
    no_color: bool,
    records: Option<String>,
    search: String,
    fragment: Option<String>,
    context: Option<QueryContext>,
    state: String,
    backend: Option<String>,
    go: Option<Direction>,
    gallery: GalleryOptions,
    inline_annotations: bool,
    timeout: usize,
    proxy: Option<String>,
    output: Option<String>,
    output_format: OutputFormat,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// `--query` fills every field positionally; the single-field flags (and
/// their config counterparts) override it.
fn build_context(args: &CliArgs, cfg: &ConfigFile) -> Option<QueryContext> {
    let mut ctx = non_empty(args.query.clone().or_else(|| cfg.query.clone()))
        .map(|q| QueryContext::from_query_list(&q))
        .unwrap_or_default();

    let overrides = [
        (&mut ctx.series, args.series.clone().or_else(|| cfg.series.clone())),
        (&mut ctx.sample, args.sample.clone().or_else(|| cfg.sample.clone())),
        (
            &mut ctx.subsystem,
            args.subsystem.clone().or_else(|| cfg.subsystem.clone()),
        ),
        (
            &mut ctx.data_run,
            args.data_run.clone().or_else(|| cfg.data_run.clone()),
        ),
        (
            &mut ctx.ref_run,
            args.ref_run.clone().or_else(|| cfg.ref_run.clone()),
        ),
    ];
    for (field, value) in overrides {
        if let Some(value) = non_empty(value) {
            *field = value;
        }
    }

    if ctx.is_empty() {
        None
    } else {
        Some(ctx)
    }
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let no_color = args.no_color || cfg.no_color.unwrap_or(false);
    let context = build_context(&args, &cfg);

    let records = non_empty(args.records.or(cfg.records)).map(|p| config::expand_tilde_string(&p));
    let search = args.search.or(cfg.search).unwrap_or_default();

    let state = match non_empty(args.state.or(cfg.state)) {
        Some(path) => config::expand_tilde_string(&path),
        None => config::default_state_path()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| "./plotgallery-state.json".to_string()),
    };

    let backend = non_empty(args.backend.or(cfg.backend));
    let go = match args.go.as_deref() {
        Some(raw) => Some(
            Direction::parse(raw).ok_or_else(|| format!("invalid go '{raw}', expected next or prev"))?,
        ),
        None => None,
    };
    if go.is_some() && backend.is_none() {
        return Err("--go needs a backend endpoint (--backend or config 'backend')".to_string());
    }

    let columns = args.columns.or(cfg.columns).unwrap_or(DEFAULT_COLUMNS);
    let scale_mode_raw = args
        .scale_mode
        .or(cfg.scale_mode)
        .unwrap_or_else(|| ScaleMode::default().label().to_string());
    let scale_mode = ScaleMode::parse(&scale_mode_raw).ok_or_else(|| {
        format!("invalid scale-mode '{scale_mode_raw}', expected per-record or shared")
    })?;
    let gallery = GalleryOptions {
        columns,
        scale: ScaleOptions {
            mode: scale_mode,
            limit: args
                .max_thumb
                .or(cfg.max_thumb)
                .unwrap_or(DEFAULT_THUMBNAIL_LIMIT),
            step: args
                .scale_step
                .or(cfg.scale_step)
                .unwrap_or(DEFAULT_DIVISOR_STEP),
        },
    };
    gallery.validate().map_err(|e| e.to_string())?;

    let inline_annotations = args.inline_annotations || cfg.inline_annotations.unwrap_or(false);
    let timeout = args.timeout.or(cfg.timeout).unwrap_or(10);
    if timeout == 0 {
        return Err("invalid timeout, expected positive integer".to_string());
    }
    let proxy = non_empty(args.proxy.or(cfg.proxy));

    let output = non_empty(args.output.or(cfg.output)).map(|p| config::expand_tilde_string(&p));
    let output_format = match non_empty(args.output_format.or(cfg.output_format)) {
        Some(raw) => OutputFormat::parse(&raw).ok_or_else(|| {
            format!("invalid output-format '{raw}', expected text, json or html")
        })?,
        None => output
            .as_deref()
            .and_then(output::infer_format_from_path)
            .unwrap_or(OutputFormat::Text),
    };

    if go.is_none() && records.is_none() {
        return Err("a records file must be specified (--records or config 'records')".to_string());
    }

    Ok(RunConfig {
        verbose: args.verbose,
        no_color,
        records,
        search,
        fragment: non_empty(args.fragment),
        context,
        state,
        backend,
        go,
        gallery,
        inline_annotations,
        timeout,
        proxy,
        output,
        output_format,
    })
}

fn runner_options(run: &RunConfig) -> Options {
    Options {
        records: match run.records.as_ref() {
            Some(path) => RecordSource::FilePath(path.clone()),
            None => RecordSource::Inline(Vec::new()),
        },
        search: run.search.clone(),
        fragment: run.fragment.clone(),
        gallery: run.gallery,
        context: run.context.clone(),
        state_file: Some(run.state.clone()),
        backend: run.backend.clone(),
        timeout_seconds: run.timeout,
        proxy: run.proxy.clone(),
        inline_annotations: run.inline_annotations,
        annotation_root: None,
    }
}

fn spinner(message: &str) -> Result<ProgressBar, String> {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_style(
        ProgressStyle::with_template(":: {spinner} {msg} :: [{elapsed_precise}]")
            .map_err(|e| format!("failed to build progress bar style: {e}"))?,
    );
    pb.set_message(message.to_string());
    Ok(pb)
}

fn print_summary(run: &RunConfig) {
    format_kv_line("Records", format_opt_value(run.records.as_deref().unwrap_or(""), "-"));
    format_kv_line("Search", format_opt_value(&run.search, "(none)"));
    format_kv_line("Columns", &run.gallery.columns.to_string());
    format_kv_line(
        "Scale",
        &format!(
            "{} (max {}px, step {})",
            run.gallery.scale.mode.label(),
            run.gallery.scale.limit,
            run.gallery.scale.step
        ),
    );
    format_kv_line("Backend", format_opt_value(run.backend.as_deref().unwrap_or(""), "-"));
    format_kv_line("State", &run.state);
    format_kv_line("Timeout", &format!("{}s", run.timeout));
    if let Some(output) = run.output.as_deref() {
        format_kv_line("Output", output);
    }
    eprintln!();
}

fn report_result(run: &RunConfig, result: &RunResult) {
    let view = &result.view;
    info(&format!(
        "{} of {} plots shown in {} rows",
        view.visible.to_string().bold().green(),
        view.total,
        view.layout.rows.len()
    ));
    if let Some(ctx) = view.context.as_ref() {
        info(&format!(
            "context: data {} ref {} ({} / {} / {})",
            format_opt_value(&ctx.data_run, "-"),
            format_opt_value(&ctx.ref_run, "-"),
            format_opt_value(&ctx.series, "-"),
            format_opt_value(&ctx.sample, "-"),
            format_opt_value(&ctx.subsystem, "-"),
        ));
    }
    if let Some(nav) = view.navigation.as_ref() {
        let show = |n: Option<u64>| n.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string());
        info(&format!(
            "runs: {} listed, previous {}, next {}",
            nav.runs.len(),
            show(nav.neighbors.previous),
            show(nav.neighbors.next)
        ));
        if run.verbose > 1 {
            for run_number in nav.runs.iter() {
                eprintln!("   {}", run_number);
            }
        }
    }
    if let Some(e) = result.navigation_error.as_deref() {
        warn(&format!("navigation unavailable: {e}"));
    }
    if run.verbose > 0 {
        for name in result.skipped_runs.iter() {
            warn(&format!("skipping run without a run number: {name}"));
        }
    }
    for (index, e) in result.annotation_errors.iter() {
        warn(&format!("annotation for plot {index} unreadable: {e}"));
    }
    if run.verbose > 0 {
        for entry in view.layout.entries() {
            eprintln!(
                "   {:<40} {:>7.1} x {:<7.1} {}",
                entry.name.cyan(),
                entry.width,
                entry.height,
                entry.pdf_path
            );
        }
    }
}

async fn write_output(path: &str, rendered: &[u8]) -> Result<(), String> {
    let mut outfile = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .await
        .map_err(|e| format!("failed to open output file: {e}"))?;
    outfile
        .write_all(rendered)
        .await
        .map_err(|_| "failed to write output file".to_string())
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    print_banner();
    print_summary(&run);

    let runner = Runner::new(runner_options(&run)).map_err(|e| e.to_string())?;

    if let Some(direction) = run.go {
        let pb = spinner(&format!("listing runs for {} run", direction.label()))?;
        let query = runner.navigate(direction).await;
        pb.finish_and_clear();
        let query = query.map_err(|e| format!("navigation failed: {e}"))?;
        info(&format!(
            "{} run {} submitted to {}",
            direction.label(),
            query.data_info.bold().green(),
            run.state
        ));
        let encoded = serde_json::to_string_pretty(&query)
            .map_err(|e| format!("failed to encode navigation query: {e}"))?;
        println!("{encoded}");
        return Ok(());
    }

    let pb = match run.backend.as_deref() {
        Some(backend) => Some(spinner(&format!("loading gallery, listing runs from {backend}"))?),
        None => None,
    };
    let result = runner.run().await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let result = result.map_err(|e| e.to_string())?;
    report_result(&run, &result);

    let rendered = output::render(&result.view, run.output_format);
    match run.output.as_deref() {
        Some(path) => write_output(path, &rendered).await?,
        None => {
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(&rendered)
                .await
                .map_err(|e| format!("failed to write to stdout: {e}"))?;
            stdout
                .flush()
                .await
                .map_err(|e| format!("failed to write to stdout: {e}"))?;
        }
    }

    eprintln!();
    eprintln!(
        ":: Completed :: gallery took {}ms ::",
        result.elapsed.as_millis()
    );
    Ok(())
}

fn init_config(path: Option<PathBuf>) -> Result<(), String> {
    let path = path
        .or_else(config::default_config_path)
        .ok_or_else(|| "could not determine home directory for the config file".to_string())?;
    if config::ensure_default_config_file(&path)? {
        info(&format!("wrote default config to {}", path.display()));
    } else {
        warn(&format!("config already exists at {}", path.display()));
    }
    Ok(())
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp => {
                print!("{}", render_custom_help());
                return Ok(());
            }
            ErrorKind::DisplayVersion => {
                let cmd = CliArgs::command();
                print!("{}", cmd.render_version());
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    let user_config_path = args.config.clone().map(|p| config::expand_tilde(&p));
    if args.init_config {
        return init_config(user_config_path);
    }

    let cfg = match user_config_path.as_ref() {
        Some(path) => config::load_config(path, false)?,
        None => match config::default_config_path() {
            Some(path) => config::load_config(&path, true)?,
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(args, cfg)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))?;
    Ok(())
}
