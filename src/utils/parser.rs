use std::path::Path;

use thiserror::Error;

use crate::geometry::GeometryError;
use crate::utils::voxel_grid::VoxelGrid;

/// 体积文件读写错误
#[derive(Error, Debug)]
pub enum VolumeError {
    /// 底层文件读写失败
    #[error("读写 '{path}' 失败: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 文件头部不合法
    #[error("'{path}' 不是有效的 {format} 文件: {message}")]
    InvalidHeader {
        path: String,
        format: &'static str,
        message: String,
    },

    /// 不支持的体素数据类型
    #[error("'{path}' 使用了不支持的数据类型代码 {code}")]
    UnsupportedDatatype { path: String, code: i16 },

    /// 没有能处理该文件的解析器
    #[error("不支持的文件格式: '{path}' (支持的扩展名: {supported})")]
    UnsupportedFormat { path: String, supported: String },

    /// 两个输入体积的网格维度不一致
    #[error("网格维度不一致: '{first}' 为 {first_shape:?}, '{second}' 为 {second_shape:?}")]
    ShapeMismatch {
        first: String,
        first_shape: [usize; 3],
        second: String,
        second_shape: [usize; 3],
    },

    /// 网格几何不合法
    #[error("'{path}' 的网格几何无效: {source}")]
    Geometry {
        path: String,
        #[source]
        source: GeometryError,
    },
}

impl VolumeError {
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// 体积文件解析器 trait
/// 不同文件格式需要实现这个 trait
pub trait VolumeParser: Send + Sync {
    /// 获取支持的文件扩展名（不含点号），例如: "nii", "nii.gz"
    fn supported_extensions(&self) -> Vec<&'static str>;

    /// 检查文件扩展名是否被支持
    fn supports(&self, extension: &str) -> bool {
        self.supported_extensions()
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }

    /// 从文件路径解析体素网格数据
    fn parse_from_file(&self, file_path: &Path) -> Result<VoxelGrid, VolumeError>;

    /// 将体素网格以 float32 写出
    fn write_to_file(&self, grid: &VoxelGrid, file_path: &Path) -> Result<(), VolumeError>;

    /// 获取解析器名称（用于日志和错误信息）
    fn name(&self) -> &'static str;
}
