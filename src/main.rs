use std::process::ExitCode;

use anyhow::{Context, Result};
use env_logger::Env;
use log::debug;

use geodistance::cli::{Invocation, UsageError, parse_args};
use geodistance::pipeline;
use geodistance::utils::parser_registry::ParserRegistry;

/// 用法错误
const EXIT_USAGE: u8 = 1;
/// 输入读取或输出写入失败
const EXIT_IO: u8 = 2;

fn run() -> Result<()> {
    let config = match parse_args(std::env::args_os())? {
        Invocation::Help(text) => {
            println!("{text}");
            return Ok(());
        }
        Invocation::Run(config) => config,
    };

    // 初始化解析器注册表
    let parser_registry = ParserRegistry::new();
    debug!("已注册的解析器: {:?}", parser_registry.supported_extensions());

    pipeline::run(&config, &parser_registry).context("测地距离计算失败")?;
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.downcast_ref::<UsageError>().is_some() => {
            eprintln!("{err}");
            ExitCode::from(EXIT_USAGE)
        }
        Err(err) => {
            eprintln!("** {err:#}");
            ExitCode::from(EXIT_IO)
        }
    }
}
