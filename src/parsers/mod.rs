mod nifti;

pub use nifti::NiftiParser;

/// 获取所有可用的解析器
pub fn get_all_parsers() -> Vec<Box<dyn crate::utils::parser::VolumeParser>> {
    vec![Box::new(NiftiParser::new())]
}
