use std::ffi::OsString;
use std::path::PathBuf;

use clap::{CommandFactory, Parser};
use thiserror::Error;

use crate::config::GeodistanceConfig;
use crate::seeds::SeedMode;

/// 兼容旧式单横线写法的长选项 (如 `-domain`)
const LEGACY_OPTIONS: [&str; 7] = [
    "domain",
    "init",
    "init_val",
    "max_dist",
    "no_smooth",
    "output",
    "report",
];

/// 后随一个取值的选项，取值位置上的 `-h...` 不视为帮助
const VALUE_OPTIONS: [&str; 6] = ["domain", "init", "init_val", "max_dist", "output", "report"];

#[derive(Debug, Parser)]
#[command(
    name = "geodistance",
    about = "Measure geodesic distances from a set of voxels.",
    override_usage = "geodistance -domain mask.nii -init points.nii [options]",
    after_help = "Options may be written with one or two leading dashes (-domain or --domain).",
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Cli {
    /// Set of voxels in which the distance will be measured. All non-zero voxels will be considered.
    #[arg(long, value_name = "FILE", required = true, allow_hyphen_values = true)]
    domain: PathBuf,

    /// Initial voxels that denote 0 distance. Also the default output basename.
    #[arg(long, value_name = "FILE", required = true, allow_hyphen_values = true)]
    init: PathBuf,

    /// Initial voxels will be determined by this value (e.g. all voxels equal to '2').
    #[arg(long = "init_val", value_name = "VALUE", allow_negative_numbers = true)]
    init_val: Option<f32>,

    /// Maximum distance that will be computed. Disables smoothing.
    #[arg(long = "max_dist", value_name = "VALUE", allow_negative_numbers = true)]
    max_dist: Option<f32>,

    /// Disable smoothing on the distance metric.
    #[arg(long = "no_smooth")]
    no_smooth: bool,

    /// Output basename for all outputs.
    #[arg(long, value_name = "BASENAME", allow_hyphen_values = true)]
    output: Option<PathBuf>,

    /// Write a JSON run report (configuration, counts and stage timings).
    #[arg(long, value_name = "FILE", allow_hyphen_values = true)]
    report: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> GeodistanceConfig {
        let mut config = GeodistanceConfig::new(self.domain, self.init);
        // 标签按整数比较，小数部分向零截断
        config.seed_mode = self
            .init_val
            .map_or(SeedMode::NonZero, |value| SeedMode::Label(value as i32));
        config.max_distance = self.max_dist;
        config.smooth = !self.no_smooth;
        config.output = self.output;
        config.report = self.report;
        config
    }
}

/// 命令行解析结果
#[derive(Debug)]
pub enum Invocation {
    /// 执行计算
    Run(GeodistanceConfig),
    /// 仅打印帮助
    Help(String),
}

/// 用法错误 (缺少参数、未知选项等)
#[derive(Error, Debug)]
#[error("{0}")]
pub struct UsageError(pub String);

fn is_help(arg: &str) -> bool {
    arg.starts_with("-h") || arg == "--help"
}

fn takes_value(arg: &str) -> bool {
    arg.strip_prefix("--")
        .or_else(|| arg.strip_prefix('-'))
        .is_some_and(|name| VALUE_OPTIONS.contains(&name))
}

/// 只检查处于选项位置的参数，选项的取值不参与判断
fn wants_help(args: &[OsString]) -> bool {
    let mut expect_value = false;
    for arg in args {
        let Some(arg) = arg.to_str() else {
            expect_value = false;
            continue;
        };
        if expect_value {
            expect_value = false;
        } else if is_help(arg) {
            return true;
        } else {
            expect_value = takes_value(arg);
        }
    }
    false
}

/// 将 `-domain` 之类的旧式写法转换为 `--domain`
fn normalize(arg: OsString) -> OsString {
    let legacy = arg
        .to_str()
        .and_then(|s| s.strip_prefix('-'))
        .filter(|name| LEGACY_OPTIONS.contains(name))
        .map(|name| format!("--{name}"));
    legacy.map_or(arg, OsString::from)
}

pub fn help_text() -> String {
    Cli::command().render_help().to_string()
}

/// 解析命令行参数 (第一个元素为程序名)
pub fn parse_args<I, T>(args: I) -> Result<Invocation, UsageError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();

    if args.len() < 2 || wants_help(&args[1..]) {
        return Ok(Invocation::Help(help_text()));
    }

    let normalized = args.into_iter().map(normalize);
    Cli::try_parse_from(normalized)
        .map(|cli| Invocation::Run(cli.into_config()))
        .map_err(|e| UsageError(e.render().to_string()))
}
