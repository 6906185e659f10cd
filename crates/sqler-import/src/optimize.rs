use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use tempfile::{Builder, TempPath};

use crate::import::ImportError;

const INSERT_PREFIX: &[u8] = b"insert into";

/// 错误信息中展示的行内容上限
const MAX_DISPLAY_LEN: usize = 120;

/// 单行分类结果
#[derive(Debug, PartialEq, Eq)]
pub enum DumpLine<'a> {
    /// `INSERT INTO `table` (cols) VALUES rows;`
    Insert { table: &'a [u8], rows: &'a [u8] },
    /// 以 insert into 开头但格式不符
    Malformed,
    /// 其他内容，原样输出
    Other,
}

/// 对一行进行分类，行可以带或不带换行符
pub fn classify(line: &[u8]) -> DumpLine<'_> {
    if line.len() < INSERT_PREFIX.len() || !line[..INSERT_PREFIX.len()].eq_ignore_ascii_case(INSERT_PREFIX) {
        return DumpLine::Other;
    }

    match parse_insert(&line[INSERT_PREFIX.len()..]) {
        Some((table, rows)) => DumpLine::Insert { table, rows },
        None => DumpLine::Malformed,
    }
}

/// 解析 insert into 之后的部分: `` `table` (cols) values rows; ``
fn parse_insert(rest: &[u8]) -> Option<(&[u8], &[u8])> {
    let rest = rest.strip_prefix(b" `")?;

    let end = find(rest, b"` (")?;
    let table = &rest[..end];
    if table.is_empty() {
        return None;
    }

    // 列名列表被丢弃，只保留 values 之后的行数据
    let rest = &rest[end + 3..];
    let values = find_ignore_case(rest, b") values ")?;
    let rest = &rest[values + b") values ".len()..];

    let semicolon = rest.iter().rposition(|&b| b == b';')?;
    let rows = &rest[..semicolon];
    if rows.is_empty() {
        return None;
    }
    Some((table, rows))
}

fn find(
    haystack: &[u8],
    needle: &[u8],
) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn find_ignore_case(
    haystack: &[u8],
    needle: &[u8],
) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w.eq_ignore_ascii_case(needle))
}

/// 一次改写的统计信息
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RewriteStats {
    pub lines: u64,
    pub inserts: u64,
    pub statements: u64,
}

/// 逐行改写：同一张表连续的单行 INSERT 合并为一条多行 INSERT
///
/// 只维护当前打开语句的表名，不会缓存整份文件。
pub fn rewrite<R: BufRead, W: Write>(
    mut reader: R,
    mut writer: W,
) -> Result<RewriteStats, ImportError> {
    let mut stats = RewriteStats::default();
    let mut current_table: Option<Vec<u8>> = None;
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        stats.lines += 1;

        match classify(&line) {
            DumpLine::Insert { table, rows } => {
                stats.inserts += 1;
                if current_table.as_deref() == Some(table) {
                    writer.write_all(b",")?;
                    writer.write_all(rows)?;
                    continue;
                }

                if current_table.is_some() {
                    writer.write_all(b";\n\n")?;
                }
                writer.write_all(b"INSERT INTO `")?;
                writer.write_all(table)?;
                writer.write_all(b"` VALUES ")?;
                writer.write_all(rows)?;
                current_table = Some(table.to_vec());
                stats.statements += 1;
            }
            DumpLine::Malformed => {
                return Err(ImportError::MalformedInsert {
                    line: stats.lines,
                    content: display_line(&line),
                });
            }
            DumpLine::Other => {
                if current_table.take().is_some() {
                    writer.write_all(b";\n")?;
                }
                writer.write_all(&line)?;
            }
        }
    }

    // 文件以 INSERT 结尾时补上语句结束符
    if current_table.is_some() {
        writer.write_all(b";\n")?;
    }
    writer.flush()?;

    Ok(stats)
}

fn display_line(line: &[u8]) -> String {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_end();
    match text.char_indices().nth(MAX_DISPLAY_LEN) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// 将 dump 改写到新的临时文件，返回的路径在 drop 时自动删除
pub fn optimize(source: &Path) -> Result<TempPath, ImportError> {
    tracing::info!("优化 dump 文件: {:?}", source);
    let start_time = Instant::now();

    let input = File::open(source)?;
    let output = Builder::new().prefix("dump").suffix(".sql").tempfile()?;
    tracing::debug!("临时文件: {:?}", output.path());

    // 改写失败时 output 被 drop，临时文件随之删除
    let stats = rewrite(BufReader::new(input), BufWriter::new(output.as_file()))?;

    tracing::info!(
        "优化完成: {} 行，{} 条 INSERT 合并为 {} 条，耗时 {:.1} 秒",
        stats.lines,
        stats.inserts,
        stats.statements,
        start_time.elapsed().as_secs_f64()
    );
    Ok(output.into_temp_path())
}
