use crate::cli::args::CliArgs;
use crate::gallery::ScaleMode;
use crate::navigation::Direction;
use crate::output::OutputFormat;

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(columns) = args.columns {
        if columns == 0 {
            return Err("invalid columns, expected positive integer".to_string());
        }
    }
    if let Some(max_thumb) = args.max_thumb {
        if !max_thumb.is_finite() || max_thumb <= 0.0 {
            return Err(format!("invalid max-thumb '{max_thumb}', expected positive number"));
        }
    }
    if let Some(step) = args.scale_step {
        if !step.is_finite() || step <= 0.0 {
            return Err(format!("invalid scale-step '{step}', expected positive number"));
        }
    }
    if let Some(raw) = args.scale_mode.as_deref() {
        if ScaleMode::parse(raw).is_none() {
            return Err(format!(
                "invalid scale-mode '{raw}', expected per-record or shared"
            ));
        }
    }
    if let Some(raw) = args.go.as_deref() {
        if Direction::parse(raw).is_none() {
            return Err(format!("invalid go '{raw}', expected next or prev"));
        }
    }
    if let Some(raw) = args.output_format.as_deref() {
        if OutputFormat::parse(raw).is_none() {
            return Err(format!(
                "invalid output-format '{raw}', expected text, json or html"
            ));
        }
    }
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid timeout, expected positive integer".to_string());
        }
    }
    Ok(())
}
