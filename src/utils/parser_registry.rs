use std::path::Path;

use crate::utils::parser::{VolumeError, VolumeParser};

/// 解析器注册表
/// 管理所有可用的体积文件解析器，并根据文件扩展名匹配对应的解析器
pub struct ParserRegistry {
    parsers: Vec<Box<dyn VolumeParser>>,
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("extensions", &self.supported_extensions())
            .finish()
    }
}

impl ParserRegistry {
    /// 创建新的解析器注册表，自动注册所有可用的解析器
    pub fn new() -> Self {
        let parsers = crate::parsers::get_all_parsers();
        Self { parsers }
    }

    /// 根据文件扩展名查找匹配的解析器
    /// extension: 文件扩展名（不含点号），例如 "nii"
    pub fn find_parser(&self, extension: &str) -> Option<&dyn VolumeParser> {
        self.parsers
            .iter()
            .find(|parser| parser.supports(extension))
            .map(|p| p.as_ref())
    }

    /// 根据文件路径查找匹配的解析器
    /// 复合扩展名 (如 "nii.gz") 优先于最后一段扩展名
    pub fn find_parser_for_file(&self, file_path: &Path) -> Option<(&dyn VolumeParser, String)> {
        let file_name = file_path.file_name()?.to_str()?;
        let mut candidates = file_name.match_indices('.').map(|(pos, _)| &file_name[pos + 1..]);

        candidates.find_map(|extension| {
            self.find_parser(extension)
                .map(|parser| (parser, extension.to_string()))
        })
    }

    /// 查找解析器，找不到时返回带支持列表的错误
    pub fn require_parser_for_file(&self, file_path: &Path) -> Result<&dyn VolumeParser, VolumeError> {
        self.find_parser_for_file(file_path)
            .map(|(parser, _)| parser)
            .ok_or_else(|| VolumeError::UnsupportedFormat {
                path: file_path.display().to_string(),
                supported: self.supported_extensions().join(", "),
            })
    }

    /// 获取所有支持的扩展名列表
    pub fn supported_extensions(&self) -> Vec<String> {
        let mut extensions = Vec::new();
        for parser in &self.parsers {
            extensions.extend(
                parser
                    .supported_extensions()
                    .iter()
                    .map(|s| s.to_lowercase()),
            );
        }
        extensions.sort();
        extensions.dedup();
        extensions
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_compound_and_plain_extensions() {
        let registry = ParserRegistry::new();
        let (_, ext) = registry
            .find_parser_for_file(Path::new("data/sub.01/init.nii.gz"))
            .unwrap();
        assert_eq!(ext, "nii.gz");
        let (_, ext) = registry
            .find_parser_for_file(Path::new("domain.NII"))
            .unwrap();
        assert_eq!(ext, "NII");
    }

    #[test]
    fn unknown_extension_is_reported() {
        let registry = ParserRegistry::new();
        assert!(registry.find_parser_for_file(Path::new("grid.vasp")).is_none());
        assert!(registry.find_parser_for_file(Path::new("noext")).is_none());
        let Err(err) = registry.require_parser_for_file(Path::new("grid.vasp")) else {
            panic!("grid.vasp must not resolve to a parser");
        };
        assert!(matches!(err, VolumeError::UnsupportedFormat { .. }));
        assert!(err.to_string().contains("nii"));
    }
}
