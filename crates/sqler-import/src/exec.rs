use std::io::{self, BufRead, BufReader};
use std::process::{Command, Stdio};

/// 一次导入命令的执行结果
///
/// 非零退出码属于正常的业务结果（认证失败、SQL 错误等），不作为错误返回。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub exit_code: i32,
    /// stdout 与 stderr 按产生顺序合并后的输出
    pub output: Vec<String>,
}

impl ImportOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn output_text(&self) -> String {
        self.output.join("\n")
    }
}

/// 执行 shell 命令的能力
pub trait CommandRunner {
    fn run(
        &mut self,
        command: &str,
    ) -> io::Result<ImportOutcome>;
}

/// 通过系统 shell 执行，阻塞直到子进程退出，没有超时
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(
        &mut self,
        command: &str,
    ) -> io::Result<ImportOutcome> {
        let mut child = shell_command(command).stdout(Stdio::piped()).stdin(Stdio::null()).spawn()?;
        tracing::debug!("子进程已启动: pid={}", child.id());

        let mut output = vec![];
        if let Some(stdout) = child.stdout.take() {
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            while reader.read_until(b'\n', &mut buf)? > 0 {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']).to_string();
                tracing::debug!("> {}", line);
                output.push(line);
                buf.clear();
            }
        }

        let status = child.wait()?;
        // 被信号终止时没有退出码
        let exit_code = status.code().unwrap_or(-1);
        tracing::debug!("子进程退出: code={}", exit_code);

        Ok(ImportOutcome { exit_code, output })
    }
}

/// 命令串按 POSIX shell 规则转义，只能交给 sh 执行
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(format!("({}) 2>&1", command));
    cmd
}
