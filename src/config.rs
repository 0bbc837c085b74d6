use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::seeds::SeedMode;
use crate::smoothing::SmoothingOptions;

/// 输出文件名后缀
pub const OUTPUT_TAG: &str = "geodistance";

/// 可识别的体积文件扩展名，复合扩展名在前
const VOLUME_EXTENSIONS: [&str; 2] = [".nii.gz", ".nii"];
const DEFAULT_EXTENSION: &str = ".nii";

/// 一次测地距离计算的全部配置，由命令行参数组装
#[derive(Debug, Clone, Serialize)]
pub struct GeodistanceConfig {
    /// 计算区域掩膜文件
    pub domain: PathBuf,
    /// 初始 (种子) 体素文件
    pub init: PathBuf,
    /// 种子判定方式
    pub seed_mode: SeedMode,
    /// 最大传播距离，`None` 表示不限
    pub max_distance: Option<f32>,
    /// 用户是否要求平滑
    pub smooth: bool,
    /// 平滑参数
    pub smoothing: SmoothingOptions,
    /// 用户指定的输出基名，未指定时使用 `init`
    pub output: Option<PathBuf>,
    /// JSON 运行报告路径
    pub report: Option<PathBuf>,
}

impl GeodistanceConfig {
    pub fn new(domain: PathBuf, init: PathBuf) -> Self {
        Self {
            domain,
            init,
            seed_mode: SeedMode::NonZero,
            max_distance: None,
            smooth: true,
            smoothing: SmoothingOptions::default(),
            output: None,
            report: None,
        }
    }

    /// 是否实际执行平滑
    ///
    /// 设置了最大距离时截断边缘会被平滑削弱，因此总是跳过平滑。
    pub fn smoothing_enabled(&self) -> bool {
        self.smooth && self.max_distance.is_none()
    }

    /// 结果文件路径: `<目录>/<基名>_geodistance<扩展名>`
    pub fn output_path(&self) -> PathBuf {
        output_path(self.output.as_deref().unwrap_or(&self.init), OUTPUT_TAG)
    }
}

/// 在基名后追加 `_<tag>`，保留原有的体积扩展名 (缺省为 `.nii`)
pub fn output_path(base: &Path, tag: &str) -> PathBuf {
    let file_name = base
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let lower = file_name.to_ascii_lowercase();

    let (stem, extension) = VOLUME_EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map(|ext| file_name.split_at(file_name.len() - ext.len()))
        .unwrap_or((file_name.as_str(), DEFAULT_EXTENSION));

    let name = format!("{stem}_{tag}{extension}");
    match base.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}
