use std::time::{Instant, SystemTime, UNIX_EPOCH};

use log::debug;
use serde::{Deserialize, Serialize};

/// 单个处理阶段的耗时记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    /// 阶段名称，如 "load_domain", "propagate"
    pub stage: String,
    /// 开始时间 (Unix 时间戳，毫秒)
    pub start_time: u64,
    /// 结束时间 (Unix 时间戳，毫秒)
    pub end_time: u64,
    /// 耗时 (毫秒，单调时钟)
    pub elapsed_ms: f64,
    /// 附加信息
    pub msg: String,
}

/// 一次运行中各阶段的耗时记录
#[derive(Debug, Default, Clone, Serialize)]
pub struct PerformanceLog {
    pub records: Vec<StageRecord>,
}

impl PerformanceLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 执行 `f` 并记录其耗时，`msg` 由结果生成
    pub fn measure<T>(
        &mut self,
        stage: &str,
        f: impl FnOnce() -> T,
        msg: impl FnOnce(&T) -> String,
    ) -> T {
        let start_time = get_unix_timestamp_ms();
        let started = Instant::now();
        let value = f();
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

        let record = StageRecord {
            stage: stage.to_string(),
            start_time,
            end_time: get_unix_timestamp_ms(),
            elapsed_ms,
            msg: msg(&value),
        };
        debug!("[{}] 耗时 {:.2}ms {}", record.stage, record.elapsed_ms, record.msg);
        self.records.push(record);
        value
    }

    /// 所有阶段的总耗时 (毫秒)
    pub fn total_ms(&self) -> f64 {
        self.records.iter().map(|r| r.elapsed_ms).sum()
    }
}

/// 获取 Unix 时间戳（毫秒）
pub fn get_unix_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measure_records_stage_and_returns_value() {
        let mut log = PerformanceLog::new();
        let value = log.measure("sum", || (1..=10).sum::<u32>(), |v| format!("sum = {v}"));
        assert_eq!(value, 55);

        log.measure("noop", || (), |_| String::new());
        assert_eq!(log.records.len(), 2);

        let record = &log.records[0];
        assert_eq!(record.stage, "sum");
        assert_eq!(record.msg, "sum = 55");
        assert!(record.end_time >= record.start_time);
        assert!(log.total_ms() >= record.elapsed_ms);
    }
}
