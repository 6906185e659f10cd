use std::fmt;
use std::path::Path;

use sqler_core::escape_shell;

use crate::import::ImportError;

/// 支持的压缩格式，未指定压缩时为 `Plain`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Plain,
    Gzip,
    Tgz,
    Bzip2,
    Zstd,
    Lz4,
}

impl Compression {
    /// 可通过配置选择的压缩格式（不含 Plain）
    pub fn all() -> &'static [Compression] {
        &[
            Compression::Gzip,
            Compression::Tgz,
            Compression::Bzip2,
            Compression::Zstd,
            Compression::Lz4,
        ]
    }

    /// 根据配置中的压缩标识解析，空值表示不压缩
    pub fn resolve(id: Option<&str>) -> Result<Self, ImportError> {
        let id = match id.map(str::trim) {
            None | Some("") => return Ok(Compression::Plain),
            Some(id) => id.to_ascii_lowercase(),
        };

        Compression::all()
            .iter()
            .copied()
            .find(|c| c.aliases().contains(&id.as_str()))
            .ok_or_else(|| ImportError::UnknownCompression(id))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Compression::Plain => "plain",
            Compression::Gzip => "gzip",
            Compression::Tgz => "tgz",
            Compression::Bzip2 => "bzip2",
            Compression::Zstd => "zstd",
            Compression::Lz4 => "lz4",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Compression::Plain => &[],
            Compression::Gzip => &["gzip", "gz"],
            Compression::Tgz => &["tgz", "tar.gz"],
            Compression::Bzip2 => &["bzip2", "bz2"],
            Compression::Zstd => &["zstd", "zst"],
            Compression::Lz4 => &["lz4"],
        }
    }

    /// 生成"解压并导入"的 shell 命令
    pub fn decompressing_command(
        &self,
        client: &str,
        file: &Path,
    ) -> String {
        let file = escape_shell(&file.to_string_lossy());
        match self {
            Compression::Plain => format!("{} < {}", client, file),
            Compression::Gzip => format!("gzip -dc < {} | {}", file, client),
            Compression::Tgz => format!("tar -xzOf {} | {}", file, client),
            Compression::Bzip2 => format!("bzip2 -dc < {} | {}", file, client),
            Compression::Zstd => format!("zstd -dc < {} | {}", file, client),
            Compression::Lz4 => format!("lz4 -dc < {} | {}", file, client),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 组装最终执行的导入命令，完全由压缩格式的模板决定
pub fn build_command(
    compression: Compression,
    client: &str,
    file: &Path,
) -> String {
    compression.decompressing_command(client, file)
}

/// 支持的压缩标识，用于错误提示
pub fn supported_ids() -> String {
    Compression::all()
        .iter()
        .flat_map(|c| c.aliases().iter().copied())
        .collect::<Vec<_>>()
        .join(", ")
}
