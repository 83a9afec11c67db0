// 车间工具: 将库存恢复为出厂库存（记录操作日志）。
//
// 用法:
//   cargo run --bin reset_inventory -- [db_path]

use slitter_spacer::app::{get_default_db_path, AppState};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    slitter_spacer::logging::init();

    let db_path = std::env::args()
        .nth(1)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(get_default_db_path);

    let state = AppState::new(db_path.clone())?;
    let snapshot = state.spacer_api.reset_inventory("reset_inventory bin")?;

    println!(
        "inventory reset: db={} metal={} plastic={} units={}",
        db_path,
        snapshot.metal.len(),
        snapshot.plastic.len(),
        snapshot.total_units()
    );
    Ok(())
}
