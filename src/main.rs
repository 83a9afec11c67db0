// ==========================================
// 纵剪分条隔套配刀系统 - 命令行入口
// ==========================================
// 用法:
//   slitter-spacer <job.json> [--db PATH] [--dry-run] [--json] [--log-json] [--locale zh-CN|en]
//
// --dry-run: 只试算, 不扣减库存、不保存作业
// --log-json: 日志以 JSON 行输出
// ==========================================

use anyhow::{bail, Context, Result};
use slitter_spacer::app::{get_default_db_path, AppState};
use slitter_spacer::i18n;

struct CliArgs {
    job_path: String,
    db_path: Option<String>,
    dry_run: bool,
    json: bool,
    log_json: bool,
    locale: Option<String>,
}

fn parse_args() -> Result<CliArgs> {
    let mut job_path = None;
    let mut db_path = None;
    let mut dry_run = false;
    let mut json = false;
    let mut log_json = false;
    let mut locale = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => db_path = Some(args.next().context("--db 需要路径参数")?),
            "--locale" => locale = Some(args.next().context("--locale 需要语言参数")?),
            "--dry-run" => dry_run = true,
            "--json" => json = true,
            "--log-json" => log_json = true,
            other if other.starts_with("--") => bail!("未知参数: {}", other),
            other => {
                if job_path.replace(other.to_string()).is_some() {
                    bail!("只能指定一个作业文件");
                }
            }
        }
    }

    Ok(CliArgs {
        job_path: job_path.context("用法: slitter-spacer <job.json> [--db PATH] [--dry-run] [--json] [--log-json] [--locale L]")?,
        db_path,
        dry_run,
        json,
        log_json,
        locale,
    })
}

fn main() -> Result<()> {
    let args = parse_args()?;
    if args.log_json {
        slitter_spacer::logging::init_json();
    } else {
        slitter_spacer::logging::init();
    }
    if let Some(locale) = &args.locale {
        i18n::set_locale(locale);
    }

    let raw = std::fs::read_to_string(&args.job_path)
        .with_context(|| format!("无法读取作业文件: {}", args.job_path))?;

    let db_path = args.db_path.unwrap_or_else(get_default_db_path);
    tracing::info!("{} v{}, 使用数据库: {}", slitter_spacer::APP_NAME, slitter_spacer::VERSION, db_path);
    let state = AppState::new(db_path).map_err(anyhow::Error::msg)?;
    let job = state
        .spacer_api
        .parse_job_json(&raw)
        .with_context(|| format!("作业文件格式错误: {}", args.job_path))?;

    let report = if args.dry_run {
        state.spacer_api.preview(&job)?
    } else {
        let operator = std::env::var("USER").unwrap_or_else(|_| "cli".to_string());
        let response = state.spacer_api.calculate(&job, &operator)?;
        tracing::info!(job_id = %response.job_id, "作业已保存");
        response.report
    };

    if args.json {
        let output = serde_json::json!({
            "runId": report.run_id,
            "stacks": report.descriptors(),
            "usage": report.usage,
            "scrap": report.scrap,
            "stripWeights": report.strip_weights,
            "scrapWeight": report.scrap_weight,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", report);
    }
    Ok(())
}
