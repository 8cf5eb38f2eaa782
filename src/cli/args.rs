use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "plotgallery",
    version,
    about = "searchable thumbnail gallery for run comparison plots",
    long_about = "Plotgallery renders the plots produced for a data/reference run comparison as a searchable, fixed-column thumbnail grid with next/previous run navigation.\n\nExamples:\n  plotgallery -r plots/records.json -o gallery.html\n  plotgallery -r plots/records.json -s Timing -q 301165,301531,,Run2017,SingleMuon,CSC -b http://host/cgi-bin/handler.py\n  plotgallery --go next --state ~/.plotgallery/state.json -b http://host/cgi-bin/handler.py\n\nTip: Use --config to persist the backend and grid settings and keep CLI invocations short."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "vb",
        visible_alias = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        long = "nc",
        visible_alias = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'r',
        long = "rec",
        visible_alias = "records",
        value_name = "FILE",
        help_heading = "Input",
        help = "JSON array of plot records (png_path, pdf_path, txt_path, width, height)."
    )]
    pub records: Option<String>,

    #[arg(
        short = 'C',
        long = "cfg",
        visible_alias = "config",
        value_name = "FILE",
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.plotgallery/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        long = "ic",
        visible_alias = "init-config",
        help_heading = "Input",
        help = "Write a commented default config file if none exists, then exit."
    )]
    pub init_config: bool,

    #[arg(
        short = 's',
        long = "sr",
        visible_alias = "search",
        value_name = "TERM",
        help_heading = "Search",
        help = "Case-sensitive substring that plot names must contain."
    )]
    pub search: Option<String>,

    #[arg(
        long = "frg",
        visible_alias = "fragment",
        value_name = "FRAGMENT",
        help_heading = "Search",
        help = "URL fragment of the first page load; takes precedence over --search."
    )]
    pub fragment: Option<String>,

    #[arg(
        short = 'q',
        long = "qry",
        visible_alias = "query",
        value_name = "LIST",
        help_heading = "Context",
        help = "Comparison context as data,ref,user_id,series,sample,subsystem."
    )]
    pub query: Option<String>,

    #[arg(
        long = "ser",
        visible_alias = "series",
        value_name = "SERIES",
        help_heading = "Context",
        help = "Run series (overrides the --query field)."
    )]
    pub series: Option<String>,

    #[arg(
        long = "smp",
        visible_alias = "sample",
        value_name = "SAMPLE",
        help_heading = "Context",
        help = "Sample / dataset (overrides the --query field)."
    )]
    pub sample: Option<String>,

    #[arg(
        long = "sub",
        visible_alias = "subsystem",
        value_name = "NAME",
        help_heading = "Context",
        help = "Subsystem (overrides the --query field)."
    )]
    pub subsystem: Option<String>,

    #[arg(
        long = "dr",
        visible_alias = "data-run",
        value_name = "RUN",
        help_heading = "Context",
        help = "Data run (overrides the --query field)."
    )]
    pub data_run: Option<String>,

    #[arg(
        long = "rr",
        visible_alias = "ref-run",
        value_name = "RUN",
        help_heading = "Context",
        help = "Reference run (overrides the --query field)."
    )]
    pub ref_run: Option<String>,

    #[arg(
        short = 'S',
        long = "st",
        visible_alias = "state",
        value_name = "FILE",
        help_heading = "Context",
        help = "Context store carried between invocations (defaults to ~/.plotgallery/state.json)."
    )]
    pub state: Option<String>,

    #[arg(
        short = 'b',
        long = "be",
        visible_alias = "backend",
        value_name = "URL",
        help_heading = "Navigation",
        help = "Run listing endpoint (e.g. http://host/cgi-bin/handler.py)."
    )]
    pub backend: Option<String>,

    #[arg(
        short = 'g',
        long = "go",
        value_name = "DIRECTION",
        help_heading = "Navigation",
        help = "Jump to the next or prev run and print the submitted query instead of rendering."
    )]
    pub go: Option<String>,

    #[arg(
        short = 'n',
        long = "col",
        visible_alias = "columns",
        value_name = "N",
        help_heading = "Grid",
        help = "Number of grid columns."
    )]
    pub columns: Option<usize>,

    #[arg(
        long = "mt",
        visible_alias = "max-thumb",
        value_name = "PX",
        help_heading = "Grid",
        help = "Largest allowed thumbnail side in pixels."
    )]
    pub max_thumb: Option<f64>,

    #[arg(
        long = "ss",
        visible_alias = "scale-step",
        value_name = "STEP",
        allow_negative_numbers = true,
        help_heading = "Grid",
        help = "Divisor increment used while shrinking thumbnails."
    )]
    pub scale_step: Option<f64>,

    #[arg(
        long = "sm",
        visible_alias = "scale-mode",
        value_name = "MODE",
        help_heading = "Grid",
        help = "Scale factor per record or shared by all records (per-record, shared)."
    )]
    pub scale_mode: Option<String>,

    #[arg(
        short = 'a',
        long = "ia",
        visible_alias = "inline-annotations",
        help_heading = "Grid",
        help = "Read annotation files and embed them in the output."
    )]
    pub inline_annotations: bool,

    #[arg(
        short = 'p',
        long = "px",
        visible_alias = "proxy",
        value_name = "URL",
        help_heading = "HTTP",
        help = "HTTP proxy URL (e.g. http://127.0.0.1:8080)."
    )]
    pub proxy: Option<String>,

    #[arg(
        short = 'T',
        long = "to",
        visible_alias = "timeout",
        value_name = "SECONDS",
        help_heading = "HTTP",
        help = "Per-request timeout in seconds."
    )]
    pub timeout: Option<usize>,

    #[arg(
        short = 'o',
        long = "out",
        visible_alias = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write the gallery to a file."
    )]
    pub output: Option<String>,

    #[arg(
        short = 'A',
        long = "of",
        visible_alias = "output-format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Output format (text, json, html)."
    )]
    pub output_format: Option<String>,
}
